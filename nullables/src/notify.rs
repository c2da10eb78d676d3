//! Nullable notification sink: record messages without sending them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use txflow_notify::{NotificationSink, NotifyError, TxNotification};

/// A sink that records every published message.
pub struct NullNotifier {
    published: Mutex<Vec<(String, TxNotification)>>,
    fail: AtomicBool,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every publish fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All messages "sent" so far (for assertions).
    pub fn published(&self) -> Vec<TxNotification> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Topics of the messages sent so far, in order.
    pub fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
    }
}

impl Default for NullNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn publish(
        &self,
        topic: &str,
        notification: &TxNotification,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Publish("injected publish failure".into()));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), notification.clone()));
        Ok(())
    }
}
