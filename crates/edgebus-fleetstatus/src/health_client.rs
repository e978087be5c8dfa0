//! Thin `gghealthd` façade over a core-bus client (mirrors
//! `edgebus_config::ConfigClient`'s shape), used to look up per-component
//! status without linking against `edgebus-lifecycle` directly.

use edgebus_core::{CoreError, OrderedMap, Value};
use edgebus_corebus::Client;
use std::path::Path;

pub struct HealthClient {
    inner: Client,
}

impl HealthClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self { inner: Client::connect(socket_path).await? })
    }

    pub async fn retrieve_component_status(&self, component_name: &str) -> Result<String, CoreError> {
        let mut args = OrderedMap::new();
        args.insert("componentName", Value::str(component_name));
        let result = self.inner.call("retrieve_component_status", Value::Map(args)).await?;
        result
            .as_map()
            .and_then(|m| m.get("status"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CoreError::parse("retrieve_component_status response missing status"))
    }

    pub async fn list_components(&self) -> Result<Vec<String>, CoreError> {
        let result = self.inner.call("list_components", Value::Map(OrderedMap::new())).await?;
        result
            .as_list()
            .ok_or_else(|| CoreError::parse("list_components response was not a list"))?
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| CoreError::parse("component name was not a string")))
            .collect()
    }
}
