//! IPC broker (spec §4.E): CONNECT/SVCUID handshake over EventStream, then
//! authorized dispatch of the handful of operations components are allowed
//! to call (configuration, pub/sub, publish/subscribe to the cloud).

pub mod arena;
pub mod broker;
pub mod cloud;
pub mod error;
pub mod handshake;
pub mod local_bus;
pub mod operations;
pub mod registry;
pub mod response;
pub mod svcuid;

pub use broker::Broker;
pub use cloud::{CloudClient, IoTCoreMessage};
pub use error::IpcErrorCode;
pub use local_bus::LocalBus;
pub use registry::{AllowAllRegistry, ComponentRegistry};
pub use response::IpcResponseHandle;
pub use svcuid::SvcuidRegistry;
