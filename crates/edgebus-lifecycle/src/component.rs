//! Parses the pieces of a recipe the executor needs beyond manifest
//! selection (spec §4.H "a recipe... a set of dependency names"):
//! `ComponentDependencies`.

use crate::error::LifecycleError;
use edgebus_core::{OrderedMap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyType {
    Hard,
    Soft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version_requirement: String,
    pub dependency_type: DependencyType,
}

/// Parses `recipe.ComponentDependencies`, defaulting to `HARD` when
/// `DependencyType` is absent or unrecognized (the original treats an
/// unspecified dependency type as hard).
pub fn parse_dependencies(recipe: &OrderedMap) -> Result<Vec<Dependency>, LifecycleError> {
    let Some(deps) = recipe.get("ComponentDependencies") else {
        return Ok(Vec::new());
    };
    let map = deps
        .as_map()
        .ok_or_else(|| LifecycleError::Other(edgebus_core::CoreError::invalid("ComponentDependencies must be a map")))?;

    let mut out = Vec::with_capacity(map.len());
    for (name, value) in map.iter() {
        let entry = value.as_map().ok_or_else(|| {
            LifecycleError::Other(edgebus_core::CoreError::invalid(format!(
                "ComponentDependencies.{name} must be a map"
            )))
        })?;
        let version_requirement = entry
            .get("VersionRequirement")
            .and_then(Value::as_str)
            .unwrap_or("*")
            .to_string();
        let dependency_type = match entry.get("DependencyType").and_then(Value::as_str) {
            Some("SOFT") => DependencyType::Soft,
            _ => DependencyType::Hard,
        };
        out.push(Dependency { name: name.to_string(), version_requirement, dependency_type });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hard_when_type_is_absent() {
        let mut entry = OrderedMap::new();
        entry.insert("VersionRequirement", Value::str(">=1.0.0"));
        let mut deps = OrderedMap::new();
        deps.insert("aws.greengrass.TokenExchangeService", Value::Map(entry));
        let mut recipe = OrderedMap::new();
        recipe.insert("ComponentDependencies", Value::Map(deps));

        let parsed = parse_dependencies(&recipe).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].dependency_type, DependencyType::Hard);
        assert_eq!(parsed[0].version_requirement, ">=1.0.0");
    }

    #[test]
    fn recognizes_soft_dependencies() {
        let mut entry = OrderedMap::new();
        entry.insert("DependencyType", Value::str("SOFT"));
        let mut deps = OrderedMap::new();
        deps.insert("some.optional.Dep", Value::Map(entry));
        let mut recipe = OrderedMap::new();
        recipe.insert("ComponentDependencies", Value::Map(deps));

        let parsed = parse_dependencies(&recipe).unwrap();
        assert_eq!(parsed[0].dependency_type, DependencyType::Soft);
    }

    #[test]
    fn missing_section_yields_no_dependencies() {
        let recipe = OrderedMap::new();
        assert!(parse_dependencies(&recipe).unwrap().is_empty());
    }
}
