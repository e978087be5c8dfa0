//! Whether a component name is a live, lifecycle-managed process (spec
//! §4.E step 1: "verifies it is currently registered with the lifecycle
//! executor"). Kept as a trait so this crate doesn't depend on
//! `edgebus-lifecycle` directly — the lifecycle executor implements it and
//! hands the broker an `Arc<dyn ComponentRegistry>` at startup.

pub trait ComponentRegistry: Send + Sync {
    fn is_registered(&self, component_name: &str) -> bool;
}

/// Accepts any component name; useful for tests and for standalone
/// operation of the broker ahead of lifecycle-executor integration.
pub struct AllowAllRegistry;

impl ComponentRegistry for AllowAllRegistry {
    fn is_registered(&self, _component_name: &str) -> bool {
        true
    }
}
