//! In-process pub/sub for `PublishToTopic`/`SubscribeToTopic` (spec §4.E):
//! "local pub/sub bus analogous to the cloud version." Grounded in the
//! broadcast-fanout shape `gg_config`'s subscriptions use
//! (`edgebus-config`'s `mpsc` per-subscriber channel), generalized to a
//! named-topic broadcast since many components may subscribe to one topic.

use edgebus_core::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// One message on the local bus: either a raw byte payload
/// (`binaryMessage`) or a structured JSON-ish value (`jsonMessage`), per
/// the IPC operation's request/event schema.
#[derive(Debug, Clone)]
pub enum TopicPayload {
    Binary(Vec<u8>),
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: TopicPayload,
}

#[derive(Default)]
pub struct LocalBus {
    topics: Mutex<HashMap<String, broadcast::Sender<TopicMessage>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<TopicMessage> {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publishes `message`. A no-op (not an error) if nobody is currently
    /// subscribed to the topic, matching typical pub/sub semantics.
    pub fn publish(&self, message: TopicMessage) {
        let sender = self.sender_for(&message.topic);
        let _ = sender.send(message);
    }

    /// Subscribes to `topic`, receiving every message published after this
    /// call (no backlog/replay).
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TopicMessage> {
        self.sender_for(topic).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_messages_published_after_subscribing() {
        let bus = LocalBus::new();
        let mut rx = bus.subscribe("topic/a");
        bus.publish(TopicMessage {
            topic: "topic/a".to_string(),
            payload: TopicPayload::Binary(b"hello".to_vec()),
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "topic/a");
        assert!(matches!(received.payload, TopicPayload::Binary(b) if b == b"hello"));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = LocalBus::new();
        bus.publish(TopicMessage {
            topic: "nobody/listening".to_string(),
            payload: TopicPayload::Json(Value::Null),
        });
    }
}
