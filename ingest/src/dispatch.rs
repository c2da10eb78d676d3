//! Notification fan-out for persisted views.

use std::sync::Arc;

use tracing::warn;
use txflow_notify::{NotificationSink, TxNotification};
use txflow_types::DirectionalView;

use crate::metrics::IngestMetrics;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    topic: String,
    metrics: Arc<IngestMetrics>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, topic: String, metrics: Arc<IngestMetrics>) -> Self {
        Self {
            sink,
            topic,
            metrics,
        }
    }

    /// Publish one message per wallet reference of `view`.
    ///
    /// Fire-and-forget: a failed publish is logged, never retried.
    pub async fn notify(&self, view: &DirectionalView) -> DispatchReport {
        let mut report = DispatchReport::default();
        for wallet in view.wallets() {
            let message = TxNotification::for_wallet(view, wallet);
            match self.sink.publish(&self.topic, &message).await {
                Ok(()) => {
                    self.metrics.notifications_published.inc();
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        txid = %message.tx_id,
                        user = %message.user_id,
                        error = %e,
                        "notification failed"
                    );
                    self.metrics.notification_failures.inc();
                    report.failed += 1;
                }
            }
        }
        report
    }
}
