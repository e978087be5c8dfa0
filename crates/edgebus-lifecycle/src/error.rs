use edgebus_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Errors local to the lifecycle executor (spec §4.H), convertible into the
/// shared [`CoreError`] taxonomy at any crate boundary.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unknown component: {0}")]
    UnknownComponent(String),
    #[error("component {0} is already registered")]
    AlreadyRegistered(String),
    #[error("phase script failed: {0}")]
    PhaseFailed(String),
    #[error("phase timed out after {0:?}")]
    PhaseTimedOut(std::time::Duration),
    #[error("{0}")]
    Other(#[from] CoreError),
}

impl From<LifecycleError> for CoreError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Other(e) => e,
            LifecycleError::UnknownComponent(_) => CoreError::no_entry(err.to_string()),
            LifecycleError::AlreadyRegistered(_) => CoreError::invalid(err.to_string()),
            LifecycleError::PhaseFailed(_) => CoreError::new(ErrorKind::Failure, err.to_string()),
            LifecycleError::PhaseTimedOut(_) => CoreError::new(ErrorKind::Failure, err.to_string()),
        }
    }
}
