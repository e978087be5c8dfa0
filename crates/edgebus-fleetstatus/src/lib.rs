//! Fleet status publisher (spec §4.I): periodic and event-driven device
//! health reports sent to `$aws/things/<thingName>/greengrassv2/health/json`,
//! grounded on `gg-fleet-statusd`'s `fleet_status_service.c`.

pub mod error;
pub mod health_client;
pub mod payload;
pub mod publisher;

pub use error::FleetStatusError;
pub use health_client::HealthClient;
pub use payload::{ComponentInfo, DeploymentInformation, DeviceStatus, FleetStatusPayload, Trigger};
pub use publisher::{PublishRequest, Publisher, CADENCE_PERIOD};
