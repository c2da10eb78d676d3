//! The correlate → classify → persist → notify pipeline.
//!
//! Every trigger (mempool, block, resync, account events) funnels into
//! [`Pipeline::process`] or, for already-correlated records,
//! [`Pipeline::dispatch`]. No stage failure aborts a transaction: each unit
//! that fails is logged and skipped, and a later delivery of the same
//! transaction converges the ledger.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn, Instrument};
use txflow_chain::NodeResolver;
use txflow_notify::NotificationSink;
use txflow_store::{LedgerStore, RateStore, UserStore};
use txflow_types::{Clock, DirectionalView, RawTx, UnifiedTransaction, User};

use crate::address_index::{AddressIndex, IndexError};
use crate::classify;
use crate::config::IngestConfig;
use crate::correlate::Correlator;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::metrics::IngestMetrics;
use crate::persist::{Persister, UpsertReport};
use crate::rates::RateSnapshotter;
use crate::resolver::InputResolver;
use crate::tracing_spans::tx_process_span;
use crate::IngestError;

/// External collaborators, injected at construction.
#[derive(Clone)]
pub struct PipelineDeps {
    pub node: Arc<dyn NodeResolver>,
    pub users: Arc<dyn UserStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub rates: Arc<dyn RateStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

/// What happened to one transaction.
#[derive(Clone, Debug)]
pub enum ProcessOutcome {
    /// No tracked address involved; nothing written.
    NotOurs,
    /// The node reported amounts outside the money range; nothing written.
    Rejected(String),
    Processed(ProcessReport),
}

impl ProcessOutcome {
    pub fn is_ours(&self) -> bool {
        matches!(self, Self::Processed(_))
    }

    pub fn report(&self) -> Option<&ProcessReport> {
        match self {
            Self::NotOurs | Self::Rejected(_) => None,
            Self::Processed(report) => Some(report),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProcessReport {
    pub views: Vec<DirectionalView>,
    pub ledger: UpsertReport,
    pub touch_failures: usize,
    pub notifications: DispatchReport,
}

pub struct Pipeline {
    resolver: InputResolver,
    correlator: Correlator,
    rates: RateSnapshotter,
    persister: Persister,
    dispatcher: Dispatcher,
    users: Arc<dyn UserStore>,
    index: Arc<AddressIndex>,
    clock: Arc<dyn Clock>,
    metrics: Arc<IngestMetrics>,
}

impl Pipeline {
    /// Assemble a pipeline around an already-populated address index.
    pub fn new(
        config: &IngestConfig,
        deps: PipelineDeps,
        index: Arc<AddressIndex>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        let resolver = InputResolver::new(deps.node, config.rpc_timeout());
        let correlator = Correlator::new(
            resolver.clone(),
            index.clone(),
            deps.clock.clone(),
            metrics.clone(),
        );
        let rates = RateSnapshotter::new(
            deps.rates,
            config.tracked_markets.clone(),
            config.store_timeout(),
            metrics.clone(),
        );
        let persister = Persister::new(
            deps.ledger,
            deps.users.clone(),
            config.store_timeout(),
            metrics.clone(),
        );
        let dispatcher = Dispatcher::new(
            deps.notifier,
            config.notification_topic.clone(),
            metrics.clone(),
        );
        Self {
            resolver,
            correlator,
            rates,
            persister,
            dispatcher,
            users: deps.users,
            index,
            clock: deps.clock,
            metrics,
        }
    }

    /// Load the address index from the user store, then assemble the
    /// pipeline. Nothing is processed before the index is ready.
    pub async fn start(
        config: &IngestConfig,
        deps: PipelineDeps,
        metrics: Arc<IngestMetrics>,
    ) -> Result<Self, IngestError> {
        let (index, conflicts) = AddressIndex::load(deps.users.as_ref()).await?;
        for conflict in &conflicts {
            tracing::error!(%conflict, "address left out of index");
        }
        info!(addresses = index.len(), "address index loaded");
        Ok(Self::new(config, deps, Arc::new(index), metrics))
    }

    /// Run one raw transaction observed at `block_height` (−1 for mempool)
    /// through the whole pipeline.
    pub async fn process(&self, raw: &RawTx, block_height: i64) -> ProcessOutcome {
        let span = tx_process_span(&raw.txid, block_height);
        async {
            let started = Instant::now();
            self.metrics.transactions_seen.inc();

            let outcome = match self.correlator.correlate(raw, block_height).await {
                Ok(None) => ProcessOutcome::NotOurs,
                Ok(Some(unified)) => {
                    self.metrics.transactions_matched.inc();
                    ProcessOutcome::Processed(self.dispatch(unified).await)
                }
                Err(e) => {
                    warn!(error = %e, "transaction rejected");
                    self.metrics.transactions_rejected.inc();
                    ProcessOutcome::Rejected(e.to_string())
                }
            };

            self.metrics
                .process_time_ms
                .observe(started.elapsed().as_secs_f64() * 1000.0);
            outcome
        }
        .instrument(span)
        .await
    }

    /// Fetch `txid` from the node and process it.
    pub async fn process_txid(
        &self,
        txid: &str,
        block_height: i64,
    ) -> Result<ProcessOutcome, IngestError> {
        let raw = self.resolver.raw_transaction(txid).await?;
        Ok(self.process(&raw, block_height).await)
    }

    /// Snapshot rates, classify, then persist and notify every view of an
    /// already-correlated transaction.
    pub async fn dispatch(&self, mut unified: UnifiedTransaction) -> ProcessReport {
        unified.exchange_rates = self.rates.latest_rates().await;
        let current_height = self.current_height(unified.block_height).await;

        let views = classify::split(unified, current_height);
        self.metrics.views_produced.inc_by(views.len() as u64);

        let now = self.clock.now();
        let mut ledger = UpsertReport::default();
        let mut touch_failures = 0;
        let mut notifications = DispatchReport::default();
        for view in &views {
            ledger.merge(self.persister.upsert(view).await);
            touch_failures += self.persister.touch_wallets(view, now).await;
            notifications.merge(self.dispatcher.notify(view).await);
            debug!(
                direction = view.direction.as_str(),
                status = view.status.code(),
                wallets = view.wallets().len(),
                "view handled"
            );
        }

        info!(
            views = views.len(),
            inserted = ledger.inserted,
            updated = ledger.updated,
            failed = ledger.failed,
            notified = notifications.sent,
            "transaction processed"
        );
        ProcessReport {
            views,
            ledger,
            touch_failures,
            notifications,
        }
    }

    /// Chain tip for classification. Mempool transactions do not need one;
    /// if the node cannot answer, the transaction's own height stands in.
    async fn current_height(&self, block_height: i64) -> i64 {
        if block_height < 0 {
            return block_height;
        }
        match self.resolver.chain_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!(error = %e, "chain height unavailable, using block height");
                block_height
            }
        }
    }

    /// Current chain tip, bounded by the RPC timeout.
    pub async fn chain_height(&self) -> Result<i64, IngestError> {
        Ok(self.resolver.chain_height().await?)
    }

    /// Re-read tracked users and swap in a fresh address index.
    pub async fn refresh_index(&self) -> Result<Vec<IndexError>, IngestError> {
        Ok(self.index.rebuild(self.users.as_ref()).await?)
    }

    /// Add the addresses of a new or extended user to the live index
    /// without a full rebuild.
    ///
    /// An address owned by another wallet is refused and logged; the user's
    /// other addresses are still tracked. The first refusal is returned.
    pub fn track_user(&self, user: &User) -> Result<(), IngestError> {
        let mut refused = None;
        for (address, owner) in user.owned_addresses() {
            if let Err(e) = self.index.insert(address, owner) {
                tracing::error!(conflict = %e, "address not tracked");
                refused.get_or_insert(e);
            }
        }
        match refused {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn index(&self) -> &Arc<AddressIndex> {
        &self.index
    }

    pub fn metrics(&self) -> &Arc<IngestMetrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
