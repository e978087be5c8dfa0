use edgebus_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetStatusError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("encoding fleet status payload: {0}")]
    Encode(#[from] serde_json::Error),
}
