//! Authorization engine (spec §4.F): a permission table keyed by
//! destination, principal and operation, with STANDARD and MQTT-style
//! wildcard resource matching, plus a loader that populates the table from
//! the running config tree's `accessControl` blocks.

pub mod engine;
pub mod policy;
pub mod wildcard;

pub use engine::AuthzEngine;
pub use wildcard::LookupPolicy;
