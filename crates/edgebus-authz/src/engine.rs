//! Permission storage and lookup (spec §4.F), grounded in the original's
//! `AuthorizationModule`: a `destination -> principal -> operation -> [resource
//! pattern]` table, looked up most-specific-first.

use crate::wildcard::{self, LookupPolicy};
use edgebus_core::CoreError;
use parking_lot::RwLock;
use std::collections::HashMap;

const ANY: &str = "*";

#[derive(Default)]
struct Table {
    // destination -> principal -> operation -> resource patterns
    entries: HashMap<String, HashMap<String, HashMap<String, Vec<String>>>>,
}

/// The compiled policy store every `edgebus-ipc` operation consults before
/// dispatch.
#[derive(Default)]
pub struct AuthzEngine {
    table: RwLock<Table>,
}

impl AuthzEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one `(destination, principal, operation, resource)`
    /// permission. `principal`/`operation`/`destination` empty is rejected;
    /// an empty `resource` is rejected (spec §4.F validation).
    pub fn add_permission(
        &self,
        destination: &str,
        principal: &str,
        operation: &str,
        resource: &str,
    ) -> Result<(), CoreError> {
        if destination.is_empty() || principal.is_empty() || operation.is_empty() {
            return Err(CoreError::invalid("destination/principal/operation must be non-empty"));
        }
        if resource.is_empty() {
            return Err(CoreError::invalid("resource must be non-empty"));
        }
        let mut table = self.table.write();
        table
            .entries
            .entry(destination.to_string())
            .or_default()
            .entry(principal.to_lowercase())
            .or_default()
            .entry(operation.to_string())
            .or_default()
            .push(resource.to_string());
        Ok(())
    }

    /// Drops every permission registered under `destination` (used when a
    /// component's `accessControl` block is reloaded).
    pub fn clear_destination(&self, destination: &str) {
        self.table.write().entries.remove(destination);
    }

    /// spec §4.F lookup order: `(principal, op)` -> `(principal, *)` ->
    /// `(*, op)` -> `(*, *)`; first policy hit whose resource pattern
    /// matches `resource` wins.
    pub fn is_authorized(
        &self,
        destination: &str,
        principal: &str,
        operation: &str,
        resource: &str,
        lookup: LookupPolicy,
    ) -> bool {
        if resource.is_empty() {
            return false;
        }
        let principal = principal.to_lowercase();
        let table = self.table.read();
        let Some(principals) = table.entries.get(destination) else {
            return false;
        };

        let combos: [(&str, &str); 4] = [
            (principal.as_str(), operation),
            (principal.as_str(), ANY),
            (ANY, operation),
            (ANY, ANY),
        ];

        for (p, op) in combos {
            if let Some(patterns) = principals.get(p).and_then(|ops| ops.get(op)) {
                if patterns.iter().any(|pat| wildcard::matches(pat, resource, lookup)) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mqtt_wildcard_scenario_5() {
        let engine = AuthzEngine::new();
        engine.add_permission("mqttproxy", "P", "SubscribeToIoTCore", "topic/+/get/#").unwrap();

        assert!(engine.is_authorized(
            "mqttproxy",
            "P",
            "SubscribeToIoTCore",
            "topic/device42/get/state/foo",
            LookupPolicy::MqttStyle
        ));
        assert!(!engine.is_authorized(
            "mqttproxy",
            "P",
            "SubscribeToIoTCore",
            "topic/device42/set/state",
            LookupPolicy::MqttStyle
        ));
    }

    #[test]
    fn most_specific_combination_wins_lookup_order() {
        let engine = AuthzEngine::new();
        engine.add_permission("gg_config", "*", "*", "services/*").unwrap();
        // No component-specific rule registered: falls through to (*, *).
        assert!(engine.is_authorized(
            "gg_config",
            "comp_a",
            "GetConfiguration",
            "services/comp_a/foo",
            LookupPolicy::Standard
        ));
        assert!(!engine.is_authorized(
            "gg_config",
            "comp_a",
            "GetConfiguration",
            "system/thingName",
            LookupPolicy::Standard
        ));
    }

    #[test]
    fn unauthorized_without_any_matching_policy() {
        let engine = AuthzEngine::new();
        assert!(!engine.is_authorized(
            "mqttproxy",
            "comp",
            "PublishToIoTCore",
            "topic/x",
            LookupPolicy::MqttStyle
        ));
    }
}
