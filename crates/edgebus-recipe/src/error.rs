use thiserror::Error;

/// Errors raised while selecting a manifest/lifecycle or expanding a
/// `{type:key}` variable grammar token.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("invalid recipe: {0}")]
    Invalid(String),
    #[error("recipe section not found: {0}")]
    NoEntry(String),
    #[error("no lifecycle could be selected for this platform")]
    NoLifecycleSelected,
    #[error("malformed variable token: {0}")]
    BadToken(String),
    #[error("unrecognized variable type: {0}")]
    UnknownVariable(String),
    #[error("configuration lookup failed for {0}")]
    ConfigLookupFailed(String),
}
