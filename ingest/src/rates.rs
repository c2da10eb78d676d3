//! Exchange-rate snapshot taken once per unified transaction.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::warn;
use txflow_store::{RateStore, StoreError};
use txflow_types::RateRecord;

use crate::metrics::IngestMetrics;
use crate::resolver::bounded;

pub struct RateSnapshotter {
    store: Arc<dyn RateStore>,
    markets: Vec<String>,
    timeout: Duration,
    metrics: Arc<IngestMetrics>,
}

impl RateSnapshotter {
    pub fn new(
        store: Arc<dyn RateStore>,
        markets: Vec<String>,
        timeout: Duration,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            store,
            markets,
            timeout,
            metrics,
        }
    }

    /// Latest rate of every tracked market, in configured market order.
    ///
    /// A market without history or whose lookup fails is left out.
    pub async fn latest_rates(&self) -> Vec<RateRecord> {
        let lookups = self.markets.iter().map(|market| async move {
            let result = bounded(
                self.timeout,
                self.store.latest_rate(market),
                StoreError::Timeout,
            )
            .await;
            (market, result)
        });

        let mut snapshot = Vec::with_capacity(self.markets.len());
        for (market, result) in join_all(lookups).await {
            match result {
                Ok(Some(record)) => snapshot.push(record),
                Ok(None) => {
                    warn!(%market, "no rate recorded for market");
                    self.metrics.rate_failures.inc();
                }
                Err(e) => {
                    warn!(%market, error = %e, "rate lookup failed");
                    self.metrics.rate_failures.inc();
                }
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txflow_nullables::NullStore;

    fn rate(market: &str, rate: f64, timestamp: i64) -> RateRecord {
        RateRecord {
            market: market.into(),
            rate,
            timestamp,
        }
    }

    fn snapshotter(store: Arc<NullStore>, metrics: Arc<IngestMetrics>) -> RateSnapshotter {
        RateSnapshotter::new(
            store,
            vec!["Poloniex".into(), "Gdax".into()],
            Duration::from_secs(1),
            metrics,
        )
    }

    #[tokio::test]
    async fn one_record_per_market_in_order() {
        let store = Arc::new(NullStore::new());
        store.add_rate(rate("Gdax", 9_000.0, 10));
        store.add_rate(rate("Poloniex", 8_900.0, 10));
        store.add_rate(rate("Poloniex", 8_950.0, 20));
        let snapshot = snapshotter(store, Arc::new(IngestMetrics::new()))
            .latest_rates()
            .await;
        assert_eq!(
            snapshot,
            vec![rate("Poloniex", 8_950.0, 20), rate("Gdax", 9_000.0, 10)]
        );
    }

    #[tokio::test]
    async fn missing_market_gives_partial_snapshot() {
        let store = Arc::new(NullStore::new());
        store.add_rate(rate("Gdax", 9_000.0, 10));
        let metrics = Arc::new(IngestMetrics::new());
        let snapshot = snapshotter(store, metrics.clone()).latest_rates().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(metrics.rate_failures.get(), 1);
    }

    #[tokio::test]
    async fn failing_store_gives_empty_snapshot() {
        let store = Arc::new(NullStore::new());
        store.add_rate(rate("Gdax", 9_000.0, 10));
        store.fail_rates(true);
        let snapshot = snapshotter(store, Arc::new(IngestMetrics::new()))
            .latest_rates()
            .await;
        assert!(snapshot.is_empty());
    }
}
