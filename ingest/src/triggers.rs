//! Trigger loops that feed the pipeline: mempool polling, block polling and
//! historical resync.
//!
//! All three fan transactions out under one semaphore, so at most
//! `max_concurrent_txs` are in flight per trigger.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};
use txflow_chain::{ChainError, ChainFeed};
use txflow_types::{CONFIRMATIONS_REQUIRED, MEMPOOL_HEIGHT};

use crate::config::IngestConfig;
use crate::pipeline::{Pipeline, ProcessOutcome};
use crate::resolver::bounded;
use crate::seen_cache::SeenCache;
use crate::tracing_spans::trigger_span;
use crate::IngestError;

/// Tally of one trigger pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Transactions that went through the pipeline.
    pub processed: usize,
    /// Of those, transactions touching a tracked address.
    pub matched: usize,
    /// Transactions that could not be fetched or were rejected.
    pub failed: usize,
    /// Blocks walked (block listener and resync only).
    pub blocks: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.matched += other.matched;
        self.failed += other.failed;
        self.blocks += other.blocks;
    }
}

/// Process `ids` at `height`, at most `limiter`'s permits at a time.
async fn process_batch(
    pipeline: &Arc<Pipeline>,
    limiter: &Arc<Semaphore>,
    ids: Vec<String>,
    height: i64,
) -> BatchReport {
    let mut tasks = JoinSet::new();
    for id in ids {
        let Ok(permit) = limiter.clone().acquire_owned().await else {
            break;
        };
        let pipeline = pipeline.clone();
        tasks.spawn(async move {
            let _permit = permit;
            pipeline
                .process_txid(&id, height)
                .await
                .map_err(|e| (id, e))
        });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(ProcessOutcome::Rejected(_))) => report.failed += 1,
            Ok(Ok(outcome)) => {
                report.processed += 1;
                if outcome.is_ours() {
                    report.matched += 1;
                }
            }
            Ok(Err((txid, e))) => {
                warn!(%txid, error = %e, "transaction skipped");
                report.failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "processing task aborted");
                report.failed += 1;
            }
        }
    }
    report
}

async fn block_ids(
    feed: &dyn ChainFeed,
    height: i64,
    timeout: Duration,
) -> Result<Vec<String>, IngestError> {
    Ok(bounded(timeout, feed.block_tx_ids(height), ChainError::Timeout).await?)
}

// ── Mempool ────────────────────────────────────────────────────────────

/// Polls the node mempool and processes every txid it has not seen yet at
/// height −1.
pub struct MempoolListener {
    pipeline: Arc<Pipeline>,
    feed: Arc<dyn ChainFeed>,
    limiter: Arc<Semaphore>,
    seen: Mutex<SeenCache>,
    interval: Duration,
    timeout: Duration,
}

impl MempoolListener {
    pub fn new(pipeline: Arc<Pipeline>, feed: Arc<dyn ChainFeed>, config: &IngestConfig) -> Self {
        Self {
            pipeline,
            feed,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_txs)),
            seen: Mutex::new(SeenCache::new(config.seen_cache_capacity)),
            interval: config.mempool_poll_interval(),
            timeout: config.rpc_timeout(),
        }
    }

    pub async fn poll_once(&self) -> Result<BatchReport, IngestError> {
        let ids = bounded(self.timeout, self.feed.mempool_tx_ids(), ChainError::Timeout).await?;
        let fresh: Vec<String> = {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            ids.into_iter().filter(|id| seen.insert(id)).collect()
        };
        if fresh.is_empty() {
            return Ok(BatchReport::default());
        }
        debug!(count = fresh.len(), "new mempool transactions");
        Ok(process_batch(&self.pipeline, &self.limiter, fresh, MEMPOOL_HEIGHT).await)
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "mempool listener started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("mempool listener stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let pass = self.poll_once().instrument(trigger_span("mempool", MEMPOOL_HEIGHT));
                    match pass.await {
                        Ok(report) if report.processed > 0 || report.failed > 0 => {
                            info!(processed = report.processed, matched = report.matched, failed = report.failed, "mempool pass");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "mempool poll failed"),
                    }
                }
            }
        }
    }
}

// ── Blocks ─────────────────────────────────────────────────────────────

/// Polls the chain tip and processes every block above the last one seen.
///
/// Each new block at height `h` also replays block `h - CONFIRMATIONS_REQUIRED`,
/// whose transactions just reached confirmation depth.
pub struct BlockListener {
    pipeline: Arc<Pipeline>,
    feed: Arc<dyn ChainFeed>,
    limiter: Arc<Semaphore>,
    last_height: tokio::sync::Mutex<Option<i64>>,
    interval: Duration,
    timeout: Duration,
}

impl BlockListener {
    /// `last_height` is the last block already handled; `None` starts at the
    /// current tip.
    pub fn new(
        pipeline: Arc<Pipeline>,
        feed: Arc<dyn ChainFeed>,
        config: &IngestConfig,
        last_height: Option<i64>,
    ) -> Self {
        Self {
            pipeline,
            feed,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_txs)),
            last_height: tokio::sync::Mutex::new(last_height),
            interval: config.block_poll_interval(),
            timeout: config.rpc_timeout(),
        }
    }

    pub async fn last_height(&self) -> Option<i64> {
        *self.last_height.lock().await
    }

    /// Process every block between the last handled height and the tip.
    ///
    /// On a failed block fetch the pass stops there; the next poll resumes
    /// at that block.
    pub async fn poll_once(&self) -> Result<BatchReport, IngestError> {
        let tip = self.pipeline.chain_height().await?;
        let mut last = self.last_height.lock().await;
        let from = last.map_or(tip, |h| h + 1);

        let mut report = BatchReport::default();
        for height in from..=tip {
            let pass = self
                .process_height(height)
                .instrument(trigger_span("block", height))
                .await?;
            report.merge(pass);
            *last = Some(height);
        }
        Ok(report)
    }

    async fn process_height(&self, height: i64) -> Result<BatchReport, IngestError> {
        let ids = block_ids(self.feed.as_ref(), height, self.timeout).await?;
        let mut report = process_batch(&self.pipeline, &self.limiter, ids, height).await;
        report.blocks += 1;

        let matured = height - CONFIRMATIONS_REQUIRED;
        if matured >= 0 {
            match block_ids(self.feed.as_ref(), matured, self.timeout).await {
                Ok(ids) => {
                    let sweep = process_batch(&self.pipeline, &self.limiter, ids, matured).await;
                    report.processed += sweep.processed;
                    report.matched += sweep.matched;
                    report.failed += sweep.failed;
                }
                Err(e) => warn!(height = matured, error = %e, "confirmation sweep skipped"),
            }
        }
        Ok(report)
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "block listener started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("block listener stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) if report.blocks > 0 => {
                            info!(blocks = report.blocks, processed = report.processed, matched = report.matched, "block pass");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "block poll failed"),
                    }
                }
            }
        }
    }
}

// ── Resync ─────────────────────────────────────────────────────────────

/// Replay blocks `from..=to` with their recorded heights.
///
/// A block that cannot be fetched is logged and skipped. Stops early when
/// `shutdown` fires.
pub async fn resync(
    pipeline: Arc<Pipeline>,
    feed: Arc<dyn ChainFeed>,
    config: &IngestConfig,
    from: i64,
    to: i64,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<BatchReport, IngestError> {
    if from < 0 || to < from {
        return Err(IngestError::Config(format!("invalid resync range {from}..={to}")));
    }
    let limiter = Arc::new(Semaphore::new(config.max_concurrent_txs));
    let timeout = config.rpc_timeout();
    info!(from, to, "resync started");

    let mut report = BatchReport::default();
    for height in from..=to {
        let step = async {
            match block_ids(feed.as_ref(), height, timeout).await {
                Ok(ids) => {
                    let mut pass = process_batch(&pipeline, &limiter, ids, height).await;
                    pass.blocks = 1;
                    pass
                }
                Err(e) => {
                    warn!(error = %e, "block skipped");
                    BatchReport::default()
                }
            }
        }
        .instrument(trigger_span("resync", height));

        tokio::select! {
            _ = shutdown.recv() => {
                info!(height, "resync interrupted");
                break;
            }
            pass = step => report.merge(pass),
        }
    }

    info!(
        blocks = report.blocks,
        processed = report.processed,
        matched = report.matched,
        failed = report.failed,
        "resync finished"
    );
    Ok(report)
}
