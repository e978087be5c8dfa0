//! Loads `accessControl` policy blocks out of the running config tree into
//! an [`AuthzEngine`] (spec §4.F), grounded in the original's
//! `AuthorizationPolicyParser::parseAllAuthorizationPolicies`.
//!
//! Config shape walked: `services.<componentName>.configuration.
//! accessControl.<destination>.<policyId> = { policyDescription?, operations,
//! resources }`. `principals` is never read from config: the original
//! synthesizes it as exactly `[lower(componentName)]`, and this loader does
//! the same.

use crate::engine::AuthzEngine;
use edgebus_core::Value;
use tracing::{error, warn};

/// Walks `configRoot.services.*.configuration.accessControl` and registers
/// every well-formed policy into `engine`. Malformed policies are logged and
/// skipped rather than failing the whole load, matching the original's
/// per-policy `try`/`catch` recovery.
pub fn load_policies(engine: &AuthzEngine, config_root: &Value) {
    let Some(services) = config_root.as_map().and_then(|m| m.get("services")).and_then(Value::as_map)
    else {
        warn!("no services config present, no authorization policies loaded");
        return;
    };

    for (service_key, service) in services.iter() {
        let Some(service) = service.as_map() else { continue };
        let component_name = service_key.to_lowercase();

        let Some(access_control) = service
            .get("configuration")
            .and_then(Value::as_map)
            .and_then(|c| c.get("accessControl"))
            .and_then(Value::as_map)
        else {
            continue;
        };

        for (destination, policies) in access_control.iter() {
            let Some(policies) = policies.as_map() else { continue };
            for (policy_id, policy) in policies.iter() {
                let Some(policy) = policy.as_map() else { continue };
                load_one_policy(engine, destination, policy_id, &component_name, policy);
            }
        }
    }
}

fn load_one_policy(
    engine: &AuthzEngine,
    destination: &str,
    policy_id: &str,
    component_name: &str,
    policy: &edgebus_core::OrderedMap,
) {
    let operations = match policy.get("operations").and_then(Value::as_list) {
        Some(ops) if !ops.is_empty() => ops,
        _ => {
            error!(policy_id, "policy operations are missing or invalid");
            return;
        }
    };

    let resources: Vec<&str> = match policy.get("resources").and_then(Value::as_list) {
        Some(list) => list.iter().filter_map(Value::as_str).collect(),
        None => vec!["*"],
    };

    for operation in operations {
        let Some(operation) = operation.as_str() else { continue };
        for resource in &resources {
            if let Err(err) = engine.add_permission(destination, component_name, operation, resource)
            {
                error!(policy_id, %err, "invalid access control config entry");
            }
        }
    }
}
