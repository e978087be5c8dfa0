//! SVCUID minting and the per-component token registry (spec §4.E step 2).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;

/// Generates a fresh opaque token, base64url-encoded, well under the
/// spec's 63-byte limit.
fn mint() -> String {
    let mut bytes = [0u8; 33];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Maps component name to its SVCUID for the lifetime of that component's
/// process. A component reconnecting (same name, new socket) gets back the
/// same token rather than a fresh mint, matching "lifetime = component
/// process lifetime" rather than "lifetime = connection".
#[derive(Default)]
pub struct SvcuidRegistry {
    tokens: Mutex<HashMap<String, String>>,
}

impl SvcuidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_mint(&self, component_name: &str) -> String {
        let mut tokens = self.tokens.lock();
        tokens.entry(component_name.to_string()).or_insert_with(mint).clone()
    }

    /// Drops the token, e.g. when the lifecycle executor reports the
    /// component's process has exited.
    pub fn revoke(&self, component_name: &str) {
        self.tokens.lock().remove(component_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_stable_across_repeated_lookups() {
        let registry = SvcuidRegistry::new();
        let a = registry.get_or_mint("comp-a");
        let b = registry.get_or_mint("comp-a");
        assert_eq!(a, b);
        assert!(a.len() <= 63);
    }

    #[test]
    fn distinct_components_get_distinct_tokens() {
        let registry = SvcuidRegistry::new();
        let a = registry.get_or_mint("comp-a");
        let b = registry.get_or_mint("comp-b");
        assert_ne!(a, b);
    }

    #[test]
    fn revoke_forces_a_fresh_mint_on_next_lookup() {
        let registry = SvcuidRegistry::new();
        let a = registry.get_or_mint("comp-a");
        registry.revoke("comp-a");
        let b = registry.get_or_mint("comp-a");
        assert_ne!(a, b);
    }
}
