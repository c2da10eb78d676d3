//! In-process fan-out of notifications over a tokio broadcast channel.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{NotificationSink, NotifyError, TxNotification};

/// An event delivered to subscribers: the topic plus the JSON payload.
#[derive(Clone, Debug, Serialize)]
pub struct PublishedEvent {
    pub topic: String,
    pub payload: String,
}

/// Publishes serialized notifications to every current subscriber.
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// the publisher. Delivery is at-most-once: with no subscriber attached the
/// event is dropped and the publish still succeeds.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PublishedEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Get a receiver for all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotifier {
    async fn publish(
        &self,
        topic: &str,
        notification: &TxNotification,
    ) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)?;
        let event = PublishedEvent {
            topic: topic.to_string(),
            payload,
        };
        match self.tx.send(event) {
            Ok(delivered) => debug!(topic, delivered, "notification published"),
            Err(_) => debug!(topic, "no subscribers, notification dropped"),
        }
        Ok(())
    }
}
