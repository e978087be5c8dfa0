//! Exposes the executor's health over a `gghealthd` core-bus server (spec
//! §6: `gghealthd` is one of the well-known core-bus socket addresses),
//! mirroring `edgebus_config::server`'s store-to-method-table shape.

use crate::executor::Executor;
use edgebus_core::Value;
use edgebus_corebus::{MethodDesc, Server};
use std::path::Path;
use std::sync::Arc;

fn component_name_of(args: &Value) -> Result<String, edgebus_core::CoreError> {
    args.as_map()
        .and_then(|m| m.get("componentName"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| edgebus_core::CoreError::invalid("missing componentName"))
}

/// Builds the `gghealthd` method table over `executor`.
pub fn methods(executor: Arc<Executor>) -> Vec<MethodDesc> {
    vec![
        {
            let executor = executor.clone();
            MethodDesc::new("retrieve_component_status", false, move |args, handle| {
                let executor = executor.clone();
                async move {
                    match component_name_of(&args) {
                        Ok(name) => {
                            let status = executor.status(&name);
                            let mut result = edgebus_core::OrderedMap::new();
                            result.insert("componentName", Value::str(&name));
                            result.insert("status", Value::str(status.as_str()));
                            let _ = handle.respond(Value::Map(result)).await;
                        }
                        Err(e) => {
                            let _ = handle.return_err(e.kind, e.message).await;
                        }
                    }
                }
            })
        },
        {
            let executor = executor.clone();
            MethodDesc::new("list_components", false, move |_args, handle| {
                let executor = executor.clone();
                async move {
                    let names = executor.component_names();
                    let _ = handle.respond(Value::List(names.into_iter().map(Value::str).collect())).await;
                }
            })
        },
    ]
}

/// Starts a `gghealthd` server backed by `executor`, listening on
/// `socket_path` until the listener errors.
pub async fn serve(executor: Arc<Executor>, socket_path: impl AsRef<Path>) -> Result<(), edgebus_core::CoreError> {
    let server = Server::new(methods(executor));
    server.listen(socket_path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DeviceFacts;
    use edgebus_core::OrderedMap;
    use edgebus_recipe::ConfigLookup;
    use tempfile::tempdir;

    struct NoConfig;
    impl ConfigLookup for NoConfig {
        fn lookup(&self, _: &str, _: &str) -> Option<Value> {
            None
        }
    }

    fn facts() -> DeviceFacts {
        DeviceFacts {
            kernel_root_path: std::env::temp_dir().to_string_lossy().to_string(),
            thing_name: "MyThing".into(),
            aws_region: "us-east-1".into(),
            gg_root_ca_path: "/etc/greengrass/rootCA.pem".into(),
            ggc_version: "2.0.0".into(),
        }
    }

    #[tokio::test]
    async fn retrieve_component_status_round_trips_over_a_real_socket() {
        let executor = Arc::new(Executor::new(facts(), Arc::new(NoConfig)));
        let mut lifecycle = OrderedMap::new();
        lifecycle.insert("run", Value::str("exit 0"));
        let mut manifest = OrderedMap::new();
        let mut platform = OrderedMap::new();
        platform.insert("os", Value::str("linux"));
        manifest.insert("Platform", Value::Map(platform));
        manifest.insert("Lifecycle", Value::Map(lifecycle));
        let mut recipe = OrderedMap::new();
        recipe.insert("Manifests", Value::List(vec![Value::Map(manifest)]));
        executor.register("com.example.App", "1.0.0", recipe).unwrap();

        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("gghealthd.sock");
        let socket_for_server = socket_path.clone();
        let executor_for_server = executor.clone();
        tokio::spawn(async move {
            let _ = serve(executor_for_server, &socket_for_server).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = edgebus_corebus::Client::connect(&socket_path).await.unwrap();
        let mut args = OrderedMap::new();
        args.insert("componentName", Value::str("com.example.App"));
        let result = client.call("retrieve_component_status", Value::Map(args)).await.unwrap();
        let status = result.as_map().unwrap().get("status").unwrap().as_str().unwrap();
        assert_eq!(status, "NEW");
    }
}
