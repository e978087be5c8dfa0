//! Component lifecycle executor (spec §4.H): dependency-ordered run lists,
//! a per-component FSM driving install/startup/run/shutdown phase scripts
//! with bounded retries, and the deployment queue those phases are driven
//! from.

pub mod component;
pub mod dependency_order;
pub mod deployment;
pub mod error;
pub mod error_rate;
pub mod executor;
pub mod fsm;
pub mod health_server;
pub mod phase_runner;
pub mod status;

pub use component::{Dependency, DependencyType};
pub use deployment::{Deployment, DeploymentQueue, DeploymentType, PushOutcome, Stage};
pub use error::LifecycleError;
pub use executor::{DeviceFacts, Executor};
pub use fsm::{Event, State, UpdateFlags};
pub use status::ComponentStatus;
