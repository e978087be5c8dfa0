//! Exposes a [`ConfigStore`] as a core-bus server at the `gg_config`
//! address, mirroring the operation shape `core-bus-gg-config` expects.

use crate::store::ConfigStore;
use edgebus_core::Value;
use edgebus_corebus::{MethodDesc, Server};
use std::path::Path;
use tracing::debug;

fn key_path_of(args: &Value) -> Result<Vec<String>, edgebus_core::CoreError> {
    let list = args
        .as_map()
        .and_then(|m| m.get("key_path"))
        .and_then(Value::as_list)
        .ok_or_else(|| edgebus_core::CoreError::invalid("missing key_path"))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| edgebus_core::CoreError::invalid("key_path segment is not a string"))
        })
        .collect()
}

/// Builds the `gg_config` method table over `store`.
pub fn methods(store: ConfigStore) -> Vec<MethodDesc> {
    vec![
        {
            let store = store.clone();
            MethodDesc::new("read", false, move |args, handle| {
                let store = store.clone();
                async move {
                    let result = key_path_of(&args).and_then(|p| store.read(&p));
                    match result {
                        Ok(v) => {
                            let _ = handle.respond(v).await;
                        }
                        Err(e) => {
                            debug!(error = %e, "gg_config read failed");
                            let _ = handle.return_err(e.kind, e.message).await;
                        }
                    }
                }
            })
        },
        {
            let store = store.clone();
            MethodDesc::new("list", false, move |args, handle| {
                let store = store.clone();
                async move {
                    let result = key_path_of(&args).and_then(|p| store.list(&p));
                    match result {
                        Ok(names) => {
                            let _ = handle
                                .respond(Value::List(names.into_iter().map(Value::str).collect()))
                                .await;
                        }
                        Err(e) => {
                            let _ = handle.return_err(e.kind, e.message).await;
                        }
                    }
                }
            })
        },
        {
            let store = store.clone();
            MethodDesc::new("write", false, move |args, handle| {
                let store = store.clone();
                async move {
                    let outcome = (|| {
                        let key_path = key_path_of(&args)?;
                        let map = args.as_map().ok_or_else(|| edgebus_core::CoreError::invalid("args is not a map"))?;
                        let value = map
                            .get("value")
                            .cloned()
                            .ok_or_else(|| edgebus_core::CoreError::invalid("missing value"))?;
                        let timestamp = map.get("timestamp").and_then(Value::as_int).unwrap_or(0);
                        if timestamp < 0 {
                            return Err(edgebus_core::CoreError::unsupported("timestamp is negative"));
                        }
                        store.write(&key_path, value, timestamp)
                    })();
                    match outcome {
                        Ok(()) => {
                            let _ = handle.respond(Value::Null).await;
                        }
                        Err(e) => {
                            let _ = handle.return_err(e.kind, e.message).await;
                        }
                    }
                }
            })
        },
        {
            let store = store.clone();
            MethodDesc::new("delete", false, move |args, handle| {
                let store = store.clone();
                async move {
                    let result = key_path_of(&args).and_then(|p| store.delete(&p));
                    match result {
                        Ok(()) => {
                            let _ = handle.respond(Value::Null).await;
                        }
                        Err(e) => {
                            let _ = handle.return_err(e.kind, e.message).await;
                        }
                    }
                }
            })
        },
        {
            let store = store.clone();
            MethodDesc::new("subscribe", true, move |args, handle| {
                let store = store.clone();
                async move {
                    let key_path = match key_path_of(&args) {
                        Ok(p) => p,
                        Err(e) => {
                            let _ = handle.return_err(e.kind, e.message).await;
                            return;
                        }
                    };
                    let mut rx = store.subscribe(&key_path);
                    loop {
                        tokio::select! {
                            changed = rx.recv() => {
                                match changed {
                                    Some(path) => {
                                        let event = Value::List(path.into_iter().map(Value::str).collect());
                                        if handle.push_event(event).await.is_err() {
                                            break;
                                        }
                                    }
                                    None => break,
                                }
                            }
                            _ = handle.closed() => break,
                        }
                    }
                }
            })
        },
    ]
}

/// Starts a `gg_config` server backed by `store`, listening on
/// `socket_path`. Runs until the listener errors (mirrors
/// `gg_fleet_statusd_start_server`'s never-returns loop shape).
pub async fn serve(store: ConfigStore, socket_path: impl AsRef<Path>) -> Result<(), edgebus_core::CoreError> {
    let server = Server::new(methods(store));
    server.listen(socket_path).await
}
