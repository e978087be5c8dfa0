//! The cloud MQTT session, treated as a black box per spec §1 ("the MQTT
//! client library... a black box session that publishes, subscribes, and
//! reports connectivity"). `edgebus-ipc` only needs the surface the
//! `PublishToIoTCore`/`SubscribeToIoTCore` operations consume.

use async_trait::async_trait;
use edgebus_core::CoreError;
use tokio::sync::mpsc;

/// One inbound message delivered to a `SubscribeToIoTCore` stream.
#[derive(Debug, Clone)]
pub struct IoTCoreMessage {
    pub topic_name: String,
    pub payload: Vec<u8>,
}

/// Implemented by whatever owns the real MQTT session; `edgebus-ipc` only
/// calls through this trait so the broker can be exercised in tests
/// without a live cloud connection.
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn publish(&self, topic_name: &str, payload: &[u8], qos: u8) -> Result<(), CoreError>;

    /// Registers interest in `topic_filter`; the returned receiver yields
    /// every matching message until the subscription is dropped.
    fn subscribe(&self, topic_filter: &str) -> mpsc::UnboundedReceiver<IoTCoreMessage>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// An in-memory stand-in used by this crate's own tests: publishing
    /// to a topic immediately fans it out to any filter that textually
    /// matches (exact match only, no wildcard logic — real filter
    /// matching is the MQTT client's job, out of scope here).
    #[derive(Default)]
    pub struct FakeCloudClient {
        subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<IoTCoreMessage>>>,
        pub published: Mutex<Vec<(String, Vec<u8>, u8)>>,
    }

    impl FakeCloudClient {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CloudClient for FakeCloudClient {
        async fn publish(&self, topic_name: &str, payload: &[u8], qos: u8) -> Result<(), CoreError> {
            self.published.lock().push((topic_name.to_string(), payload.to_vec(), qos));
            if let Some(tx) = self.subscribers.lock().get(topic_name) {
                let _ = tx.send(IoTCoreMessage { topic_name: topic_name.to_string(), payload: payload.to_vec() });
            }
            Ok(())
        }

        fn subscribe(&self, topic_filter: &str) -> mpsc::UnboundedReceiver<IoTCoreMessage> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.subscribers.lock().insert(topic_filter.to_string(), tx);
            rx
        }
    }
}
