//! Periodic and event-driven fleet status publishing (spec §4.I), grounded
//! on `fleet_status_service.c`'s `publish_fleet_status_update`: walk the
//! registered services, skip the ignored core components, look up each
//! one's version and health, and publish a single JSON document.

use crate::error::FleetStatusError;
use crate::health_client::HealthClient;
use crate::payload::{
    ComponentInfo, DeploymentInformation, DeviceStatus, FleetStatusPayload, Trigger, ARCHITECTURE, PLATFORM,
    RUNTIME,
};
use edgebus_config::ConfigClient;
use edgebus_core::CoreError;
use edgebus_ipc::CloudClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 24 hours, per spec §4.I ("every 24 h with trigger=CADENCE").
pub const CADENCE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Publisher {
    config: ConfigClient,
    health: HealthClient,
    cloud: Arc<dyn CloudClient>,
    thing_name: String,
    ggc_version: String,
}

/// A request to publish, carried over the trigger channel `run` drains.
pub struct PublishRequest {
    pub trigger: Trigger,
    pub deployment_information: DeploymentInformation,
}

impl Publisher {
    pub fn new(
        config: ConfigClient,
        health: HealthClient,
        cloud: Arc<dyn CloudClient>,
        thing_name: impl Into<String>,
        ggc_version: impl Into<String>,
    ) -> Self {
        Self { config, health, cloud, thing_name: thing_name.into(), ggc_version: ggc_version.into() }
    }

    async fn collect_components(&self) -> Vec<ComponentInfo> {
        let names = match self.config.list(&["services"]).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "unable to retrieve list of components from config");
                return Vec::new();
            }
        };

        let mut infos = Vec::new();
        for name in names {
            if crate::payload::IGNORED_COMPONENTS.contains(&name.as_str()) {
                continue;
            }

            let version = match self.config.read_str(&["services", &name, "version"]).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(component = %name, error = %e, "unable to retrieve component version, skipping");
                    continue;
                }
            };

            let status = match self.health.retrieve_component_status(&name).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(component = %name, error = %e, "unable to retrieve component health, skipping");
                    continue;
                }
            };

            let fleet_config_arns = match self.config.read(&["services", &name, "configArn"]).await {
                Ok(v) => v
                    .as_list()
                    .map(|l| l.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default(),
                Err(_) => Vec::new(),
            };

            infos.push(ComponentInfo {
                component_name: name,
                version,
                fleet_config_arns,
                is_root: true,
                status,
            });
        }
        infos
    }

    /// Reads, increments, and persists the monotonic sequence number at
    /// `system/fleetStatusSequenceNum`, matching the original's "if found,
    /// increment; otherwise start at 1" behavior.
    async fn next_sequence_number(&self) -> Result<i64, CoreError> {
        let sequence = match self.config.read(&["system", "fleetStatusSequenceNum"]).await {
            Ok(edgebus_core::Value::Int(n)) => n + 1,
            _ => 1,
        };
        self.config
            .write(&["system", "fleetStatusSequenceNum"], edgebus_core::Value::Int(sequence), 0)
            .await?;
        Ok(sequence)
    }

    pub async fn publish(
        &self,
        trigger: Trigger,
        deployment_information: DeploymentInformation,
    ) -> Result<(), FleetStatusError> {
        let components = self.collect_components().await;
        let overall_device_status = DeviceStatus::from_component_statuses(components.iter().map(|c| c.status.as_str()));
        let sequence_number = self.next_sequence_number().await?;

        let payload = FleetStatusPayload {
            ggc_version: self.ggc_version.clone(),
            platform: PLATFORM,
            architecture: ARCHITECTURE,
            runtime: RUNTIME,
            thing: self.thing_name.clone(),
            sequence_number,
            timestamp: unix_time_millis(),
            message_type: "COMPLETE",
            trigger,
            overall_device_status,
            components,
            deployment_information,
        };

        let body = payload.to_json()?;
        let topic = crate::payload::mqtt_topic(&self.thing_name);
        self.cloud.publish(&topic, &body, 0).await?;
        info!(%topic, sequence_number, "published fleet status update");
        Ok(())
    }

    /// Drives the publisher: publishes once with `initial_trigger` on
    /// startup, then on every 24h tick (`Trigger::Cadence`) and every
    /// message received on `requests` until the channel closes.
    pub async fn run(self, initial_trigger: Trigger, mut requests: mpsc::UnboundedReceiver<PublishRequest>) {
        if let Err(e) = self.publish(initial_trigger, DeploymentInformation::default()).await {
            warn!(error = %e, "initial fleet status publish failed");
        }

        let mut cadence = tokio::time::interval(CADENCE_PERIOD);
        cadence.tick().await; // first tick fires immediately; already published above
        loop {
            tokio::select! {
                _ = cadence.tick() => {
                    if let Err(e) = self.publish(Trigger::Cadence, DeploymentInformation::default()).await {
                        warn!(error = %e, "cadence fleet status publish failed");
                    }
                }
                request = requests.recv() => {
                    match request {
                        Some(request) => {
                            if let Err(e) = self.publish(request.trigger, request.deployment_information).await {
                                warn!(error = %e, "triggered fleet status publish failed");
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    }
}

fn unix_time_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edgebus_config::ConfigStore;
    use edgebus_core::{OrderedMap, Value};
    use edgebus_corebus::{Client, MethodDesc, Server};
    use edgebus_ipc::IoTCoreMessage;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeCloud {
        published: Mutex<Vec<(String, Vec<u8>, u8)>>,
    }

    #[async_trait]
    impl CloudClient for FakeCloud {
        async fn publish(&self, topic_name: &str, payload: &[u8], qos: u8) -> Result<(), CoreError> {
            self.published.lock().push((topic_name.to_string(), payload.to_vec(), qos));
            Ok(())
        }

        fn subscribe(&self, _topic_filter: &str) -> mpsc::UnboundedReceiver<IoTCoreMessage> {
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        }
    }

    async fn fake_gghealthd(socket_path: impl AsRef<std::path::Path>, statuses: Vec<(&'static str, &'static str)>) {
        let statuses: std::collections::HashMap<&'static str, &'static str> = statuses.into_iter().collect();
        let method = MethodDesc::new("retrieve_component_status", false, move |args, handle| {
            let statuses = statuses.clone();
            async move {
                let name = args.as_map().and_then(|m| m.get("componentName")).and_then(Value::as_str).unwrap_or("");
                let status = statuses.get(name).copied().unwrap_or("UNKNOWN");
                let mut result = OrderedMap::new();
                result.insert("componentName", Value::str(name));
                result.insert("status", Value::str(status));
                let _ = handle.respond(Value::Map(result)).await;
            }
        });
        let server = Server::new(vec![method]);
        let _ = server.listen(socket_path).await;
    }

    async fn wire(dir: &tempfile::TempDir, statuses: Vec<(&'static str, &'static str)>) -> (ConfigClient, HealthClient, ConfigStore) {
        let config_socket = dir.path().join("gg_config.sock");
        let health_socket = dir.path().join("gghealthd.sock");
        let store = ConfigStore::new();

        let store_for_server = store.clone();
        let config_socket_for_server = config_socket.clone();
        tokio::spawn(async move {
            let _ = edgebus_config::server::serve(store_for_server, &config_socket_for_server).await;
        });
        let health_socket_for_server = health_socket.clone();
        tokio::spawn(async move {
            fake_gghealthd(health_socket_for_server, statuses).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let config = ConfigClient::connect(&config_socket).await.unwrap();
        let health = HealthClient::connect(&health_socket).await.unwrap();
        (config, health, store)
    }

    fn seed_component(store: &ConfigStore, name: &str, version: &str) {
        store.write(&["services".into(), name.into(), "version".into()], Value::str(version), 1).unwrap();
        store
            .write(&["services".into(), name.into(), "configArn".into()], Value::List(vec![Value::str("arn:aws:greengrass:x")]), 1)
            .unwrap();
    }

    #[tokio::test]
    async fn publishes_a_healthy_snapshot_for_a_running_component() {
        let dir = tempdir().unwrap();
        let (config, health, store) = wire(&dir, vec![("com.example.App", "RUNNING")]).await;
        seed_component(&store, "com.example.App", "1.0.0");

        let cloud = Arc::new(FakeCloud::default());
        let publisher = Publisher::new(config, health, cloud.clone(), "MyThing", "2.0.0");
        publisher.publish(Trigger::NucleusLaunch, DeploymentInformation::default()).await.unwrap();

        let published = cloud.published.lock();
        assert_eq!(published.len(), 1);
        let (topic, body, qos) = &published[0];
        assert_eq!(topic, "$aws/things/MyThing/greengrassv2/health/json");
        assert_eq!(*qos, 0);
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["overallDeviceStatus"], "HEALTHY");
        assert_eq!(json["sequenceNumber"], 1);
        assert_eq!(json["components"][0]["componentName"], "com.example.App");
    }

    #[tokio::test]
    async fn ignored_core_components_are_excluded_and_broken_marks_device_unhealthy() {
        let dir = tempdir().unwrap();
        let (config, health, store) =
            wire(&dir, vec![("com.example.App", "BROKEN"), ("main", "RUNNING")]).await;
        seed_component(&store, "com.example.App", "1.0.0");
        seed_component(&store, "main", "1.0.0");

        let cloud = Arc::new(FakeCloud::default());
        let publisher = Publisher::new(config, health, cloud.clone(), "MyThing", "2.0.0");
        publisher.publish(Trigger::Cadence, DeploymentInformation::default()).await.unwrap();

        let published = cloud.published.lock();
        let json: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(json["overallDeviceStatus"], "UNHEALTHY");
        let components = json["components"].as_array().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0]["componentName"], "com.example.App");
    }

    #[tokio::test]
    async fn sequence_number_persists_and_increments_across_publishes() {
        let dir = tempdir().unwrap();
        let (config, health, store) = wire(&dir, vec![("com.example.App", "RUNNING")]).await;
        seed_component(&store, "com.example.App", "1.0.0");

        let cloud = Arc::new(FakeCloud::default());
        let publisher = Publisher::new(config, health, cloud.clone(), "MyThing", "2.0.0");
        publisher.publish(Trigger::Cadence, DeploymentInformation::default()).await.unwrap();
        publisher.publish(Trigger::Cadence, DeploymentInformation::default()).await.unwrap();

        let published = cloud.published.lock();
        let first: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&published[1].1).unwrap();
        assert_eq!(first["sequenceNumber"], 1);
        assert_eq!(second["sequenceNumber"], 2);
    }
}
