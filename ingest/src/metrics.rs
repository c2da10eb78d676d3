//! Prometheus metrics for the ingestion pipeline.
//!
//! [`IngestMetrics`] owns a dedicated [`Registry`] so the daemon can encode
//! it into the Prometheus text format and tests can read counters directly.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Histogram,
    HistogramOpts, IntCounter, Opts, Registry,
};

pub struct IngestMetrics {
    pub registry: Registry,

    // ── Correlation ─────────────────────────────────────────────────────
    /// Raw transactions handed to the pipeline.
    pub transactions_seen: IntCounter,
    /// Transactions that touched at least one tracked address.
    pub transactions_matched: IntCounter,
    /// Inputs whose previous output could not be resolved.
    pub input_resolution_failures: IntCounter,
    /// Transactions dropped because the node reported impossible amounts.
    pub transactions_rejected: IntCounter,

    // ── Classification / persistence ────────────────────────────────────
    pub views_produced: IntCounter,
    pub ledger_inserts: IntCounter,
    pub ledger_updates: IntCounter,
    pub persistence_failures: IntCounter,

    // ── Fan-out ─────────────────────────────────────────────────────────
    pub notifications_published: IntCounter,
    pub notification_failures: IntCounter,
    /// Tracked markets whose rate could not be read.
    pub rate_failures: IntCounter,

    /// Wall time of one `process` call, in milliseconds.
    pub process_time_ms: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    register_int_counter_with_registry!(Opts::new(name, help), registry)
        .unwrap_or_else(|e| panic!("failed to register {name}: {e}"))
}

impl IngestMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transactions_seen = counter(
            &registry,
            "txflow_transactions_seen_total",
            "Raw transactions handed to the pipeline",
        );
        let transactions_matched = counter(
            &registry,
            "txflow_transactions_matched_total",
            "Transactions touching at least one tracked address",
        );
        let input_resolution_failures = counter(
            &registry,
            "txflow_input_resolution_failures_total",
            "Inputs whose previous output could not be resolved",
        );
        let transactions_rejected = counter(
            &registry,
            "txflow_transactions_rejected_total",
            "Transactions dropped for amounts outside the money range",
        );
        let views_produced = counter(
            &registry,
            "txflow_views_produced_total",
            "Directional views produced by the classifier",
        );
        let ledger_inserts = counter(
            &registry,
            "txflow_ledger_inserts_total",
            "Ledger entries inserted",
        );
        let ledger_updates = counter(
            &registry,
            "txflow_ledger_updates_total",
            "Ledger entries updated in place",
        );
        let persistence_failures = counter(
            &registry,
            "txflow_persistence_failures_total",
            "Ledger or wallet writes that failed",
        );
        let notifications_published = counter(
            &registry,
            "txflow_notifications_published_total",
            "Notifications handed to the sink",
        );
        let notification_failures = counter(
            &registry,
            "txflow_notification_failures_total",
            "Notifications the sink rejected",
        );
        let rate_failures = counter(
            &registry,
            "txflow_rate_failures_total",
            "Tracked markets whose rate could not be read",
        );

        let process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "txflow_process_time_ms",
                "Time spent processing one transaction in milliseconds"
            )
            .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
            registry
        )
        .unwrap_or_else(|e| panic!("failed to register txflow_process_time_ms: {e}"));

        Self {
            registry,
            transactions_seen,
            transactions_matched,
            input_resolution_failures,
            transactions_rejected,
            views_produced,
            ledger_inserts,
            ledger_updates,
            persistence_failures,
            notifications_published,
            notification_failures,
            rate_failures,
            process_time_ms,
        }
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buf = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}
