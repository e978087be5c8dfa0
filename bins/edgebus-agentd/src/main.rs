//! The nucleus daemon: boots the `gg_config` and `gghealthd` core-bus
//! servers, the IPC broker, and the lifecycle executor in one process,
//! then brings every recipe found under `<root>/recipes` up to `Running`.

mod bootstrap;
mod config_lookup;
mod recipes;

use edgebus_authz::AuthzEngine;
use edgebus_config::{server as config_server, ConfigClient, ConfigStore};
use edgebus_core::{CoreError, Value};
use edgebus_ipc::{Broker, CloudClient, IoTCoreMessage, LocalBus};
use edgebus_lifecycle::{health_server, DeviceFacts, Executor, UpdateFlags};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Logs every publish/subscribe instead of touching a real MQTT session;
/// the cloud session itself is a black box per spec §1.
struct LoggingCloudClient;

#[async_trait::async_trait]
impl CloudClient for LoggingCloudClient {
    async fn publish(&self, topic_name: &str, payload: &[u8], qos: u8) -> Result<(), CoreError> {
        info!(topic = topic_name, bytes = payload.len(), qos, "cloud publish (no MQTT session attached)");
        Ok(())
    }

    fn subscribe(&self, _topic_filter: &str) -> mpsc::UnboundedReceiver<IoTCoreMessage> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

fn root_dir() -> PathBuf {
    std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/var/lib/edgebus"))
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    edgebus_corebus::ignore_sigpipe();

    let root = root_dir();
    let sockets_dir = root.join("sockets");
    std::fs::create_dir_all(&sockets_dir)
        .map_err(|e| CoreError::failure(format!("creating {}: {e}", sockets_dir.display())).with_source(e))?;

    let facts = bootstrap::load(&root);
    info!(root = %root.display(), thing_name = %facts.thing_name, "starting edgebus-agentd");

    let store = ConfigStore::new();
    bootstrap::seed_config(&store, &facts);

    let gg_config_socket = sockets_dir.join("gg_config.sock");
    let store_for_server = store.clone();
    let gg_config_socket_for_server = gg_config_socket.clone();
    tokio::spawn(async move {
        if let Err(e) = config_server::serve(store_for_server, &gg_config_socket_for_server).await {
            error!(error = %e, "gg_config server exited");
        }
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let device_facts = DeviceFacts {
        kernel_root_path: root.to_string_lossy().to_string(),
        thing_name: facts.thing_name.clone(),
        aws_region: facts.aws_region.clone(),
        gg_root_ca_path: facts.gg_root_ca_path.clone(),
        ggc_version: facts.ggc_version.clone(),
    };
    let executor = Arc::new(Executor::new(device_facts, Arc::new(config_lookup::StoreConfigLookup::new(store.clone()))));

    for (name, version, recipe) in recipes::load_all(&root.join("recipes")) {
        if let Err(e) = executor.register(&name, &version, recipe) {
            warn!(component = %name, error = %e, "failed to register component recipe");
        }
    }

    let gghealthd_socket = sockets_dir.join("gghealthd.sock");
    let executor_for_health = executor.clone();
    let gghealthd_socket_for_server = gghealthd_socket.clone();
    tokio::spawn(async move {
        if let Err(e) = health_server::serve(executor_for_health, &gghealthd_socket_for_server).await {
            error!(error = %e, "gghealthd server exited");
        }
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let authz = Arc::new(AuthzEngine::new());
    let config_root = store.read(&[]).unwrap_or(Value::Map(edgebus_core::OrderedMap::new()));
    edgebus_authz::policy::load_policies(&authz, &config_root);

    let config_client = Arc::new(ConfigClient::connect(&gg_config_socket).await?);
    let broker = Arc::new(Broker::new(
        authz,
        config_client,
        Arc::new(LocalBus::new()),
        Arc::new(LoggingCloudClient),
        executor.clone(),
    ));
    let ipc_socket = sockets_dir.join("ipc.sock");
    let broker_for_listen = broker.clone();
    let ipc_socket_for_listen = ipc_socket.clone();
    let broker_task = tokio::spawn(async move {
        if let Err(e) = broker_for_listen.listen(&ipc_socket_for_listen).await {
            error!(error = %e, "IPC broker exited");
        }
    });

    // Drive every registered component to Running in dependency order; a
    // component whose hard dependency never reaches Running simply stalls
    // at Installed (spec §4.H), which is surfaced through gghealthd.
    let (order, inactive) = executor.dependency_order();
    if !inactive.is_empty() {
        warn!(?inactive, "components left out of the run order (missing or cyclic dependency)");
    }
    for name in order {
        let executor = executor.clone();
        tokio::spawn(async move {
            let flags = UpdateFlags { start: true, ..Default::default() };
            if let Err(e) = executor.update(&name, flags, None).await {
                error!(component = %name, error = %e, "component failed to start");
            }
        });
    }

    let _ = broker_task.await;
    Ok(())
}
