//! Thin `gg_config` façade over a core-bus client, one-to-one with
//! `ggl_gg_config_{read,read_str,write,subscribe}` (spec §4.D), plus `list`
//! and `delete` from the distilled spec's expanded operation set.

use edgebus_core::{CoreError, OrderedMap, Value};
use edgebus_corebus::Client;
use std::path::Path;

pub struct ConfigClient {
    inner: Client,
}

fn check_depth(key_path: &[impl AsRef<str>]) -> Result<(), CoreError> {
    if key_path.len() > edgebus_core::MAX_DEPTH {
        return Err(CoreError::unsupported("key path depth exceeds maximum handled"));
    }
    Ok(())
}

fn key_path_args(key_path: &[impl AsRef<str>]) -> Value {
    let mut map = OrderedMap::new();
    map.insert("key_path", Value::List(key_path.iter().map(|s| Value::str(s.as_ref())).collect()));
    Value::Map(map)
}

impl ConfigClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self { inner: Client::connect(socket_path).await? })
    }

    pub async fn read(&self, key_path: &[impl AsRef<str>]) -> Result<Value, CoreError> {
        check_depth(key_path)?;
        self.inner.call("read", key_path_args(key_path)).await
    }

    pub async fn read_str(&self, key_path: &[impl AsRef<str>]) -> Result<String, CoreError> {
        match self.read(key_path).await? {
            Value::Buffer(b) => String::from_utf8(b)
                .map_err(|e| CoreError::config(format!("configuration value is not valid UTF-8: {e}"))),
            _ => Err(CoreError::config("configuration value is not a string")),
        }
    }

    pub async fn list(&self, key_path: &[impl AsRef<str>]) -> Result<Vec<String>, CoreError> {
        let result = self.inner.call("list", key_path_args(key_path)).await?;
        result
            .as_list()
            .ok_or_else(|| CoreError::parse("list response was not a list"))?
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| CoreError::parse("list entry was not a string")))
            .collect()
    }

    pub async fn write(&self, key_path: &[impl AsRef<str>], value: Value, timestamp: i64) -> Result<(), CoreError> {
        check_depth(key_path)?;
        if timestamp < 0 {
            return Err(CoreError::unsupported("timestamp is negative"));
        }
        let Value::Map(mut args) = key_path_args(key_path) else { unreachable!() };
        args.insert("value", value);
        args.insert("timestamp", Value::Int(timestamp));
        self.inner.call("write", Value::Map(args)).await?;
        Ok(())
    }

    pub async fn delete(&self, key_path: &[impl AsRef<str>]) -> Result<(), CoreError> {
        self.inner.call("delete", key_path_args(key_path)).await?;
        Ok(())
    }

    /// Subscribes to `key_path`; each received event is the full key path
    /// (as buffer segments) that changed.
    pub async fn subscribe(
        &self,
        key_path: &[impl AsRef<str>],
    ) -> Result<edgebus_corebus::Subscription, CoreError> {
        self.inner.subscribe("subscribe", key_path_args(key_path)).await
    }
}
