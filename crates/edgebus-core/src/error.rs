use std::fmt;

/// The error taxonomy shared by every crate in the workspace (spec §7).
///
/// Kinds, not names: callers match on `ErrorKind`, never on `CoreError`'s
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Invalid,
    Range,
    Parse,
    NoMem,
    NoEntry,
    NoConn,
    Config,
    Unsupported,
    Remote,
    Failure,
    Fatal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Invalid => "INVALID",
            ErrorKind::Range => "RANGE",
            ErrorKind::Parse => "PARSE",
            ErrorKind::NoMem => "NOMEM",
            ErrorKind::NoEntry => "NOENTRY",
            ErrorKind::NoConn => "NOCONN",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::Remote => "REMOTE",
            ErrorKind::Failure => "FAILURE",
            ErrorKind::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The crate-wide error type. Carries a stable [`ErrorKind`], a message for
/// operators, and an optional source for root-cause chains.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn no_mem(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoMem, message)
    }

    pub fn no_entry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoEntry, message)
    }

    pub fn no_conn(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoConn, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn remote(inner_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, format!("{inner_kind}: {}", message.into()))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Failure, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::NoConn | ErrorKind::Failure)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
