//! Standalone fleet status daemon: connects to the already-running
//! `gg_config`/`gghealthd` core-bus servers and drives the publisher loop
//! (spec §4.I / §5 "a fleet-status cadence thread that sleeps 24 h between
//! publishes").

use edgebus_config::ConfigClient;
use edgebus_core::CoreError;
use edgebus_fleetstatus::{HealthClient, Publisher, Trigger};
use edgebus_ipc::{CloudClient, IoTCoreMessage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// The MQTT session is a black box owned by whatever process holds the
/// real cloud connection (spec §1); this daemon logs instead of publishing
/// until one is wired in.
struct LoggingCloudClient;

#[async_trait::async_trait]
impl CloudClient for LoggingCloudClient {
    async fn publish(&self, topic_name: &str, payload: &[u8], qos: u8) -> Result<(), CoreError> {
        info!(topic = topic_name, bytes = payload.len(), qos, "fleet status publish (no MQTT session attached)");
        Ok(())
    }

    fn subscribe(&self, _topic_filter: &str) -> mpsc::UnboundedReceiver<IoTCoreMessage> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

fn sockets_dir() -> PathBuf {
    std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/var/lib/edgebus/sockets"))
}

fn thing_name() -> String {
    std::env::var("EDGEBUS_THING_NAME").unwrap_or_else(|_| "UnnamedThing".to_string())
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sockets = sockets_dir();
    let config = ConfigClient::connect(sockets.join("gg_config.sock")).await?;
    let health = HealthClient::connect(sockets.join("gghealthd.sock")).await?;

    let publisher = Publisher::new(config, health, Arc::new(LoggingCloudClient), thing_name(), env!("CARGO_PKG_VERSION"));

    // TODO: wire MQTT-reconnect and `send_fleet_status_update` RPC
    // triggers onto this channel once a cloud session is attached; until
    // then the sender just stays open so the cadence loop runs forever.
    let (_trigger_tx, trigger_rx) = mpsc::unbounded_channel();
    publisher.run(Trigger::NucleusLaunch, trigger_rx).await;
    Ok(())
}
