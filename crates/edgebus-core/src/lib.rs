//! Shared contracts for the edge agent core: the generic value tree, the
//! error taxonomy, and process-wide symbol interning. Every other crate in
//! the workspace depends on this one and nothing else circularly.

pub mod error;
pub mod json;
pub mod serde_value;
pub mod symbol;
pub mod value;

pub use error::{CoreError, ErrorKind, Result};
pub use symbol::Symbol;
pub use value::{OrderedMap, Value, MAX_DEPTH};
