//! Client notifications for correlated transactions.
//!
//! The pipeline publishes one [`TxNotification`] per wallet reference of every
//! persisted view. Delivery is at-most-once: a sink reports failure and the
//! caller logs it, nothing is retried.

pub mod broadcast;
pub mod error;
pub mod message;

pub use broadcast::{BroadcastNotifier, PublishedEvent};
pub use error::NotifyError;
pub use message::TxNotification;

use async_trait::async_trait;

/// A publish/subscribe channel that accepts transaction notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, topic: &str, notification: &TxNotification)
        -> Result<(), NotifyError>;
}
