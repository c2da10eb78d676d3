//! Account-model ingestion: a stream of single-sender, single-recipient
//! transfers instead of UTXO transactions.
//!
//! Events carry their own amount and fee, so no input resolution is needed.
//! Correlation, classification, persistence and notification are shared
//! with the UTXO path through [`Pipeline::dispatch`].

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, Instrument};
use txflow_types::{AddressAmount, UnifiedTransaction, MEMPOOL_HEIGHT};

use crate::address_index::AddressIndex;
use crate::config::IngestConfig;
use crate::correlate::{block_time, wallet_reference};
use crate::pipeline::{Pipeline, ProcessOutcome};
use crate::seen_cache::SeenCache;
use crate::tracing_spans::account_event_span;

/// One transfer as reported by an account-model node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTx {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Value moved, in minor units.
    pub amount: i64,
    pub fee: i64,
    pub block_height: i64,
    #[serde(default)]
    pub block_time: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    Mempool(AccountTx),
    Block(AccountTx),
}

impl AccountEvent {
    pub fn tx(&self) -> &AccountTx {
        match self {
            Self::Mempool(tx) | Self::Block(tx) => tx,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Mempool(_) => "mempool",
            Self::Block(_) => "block",
        }
    }
}

/// Tracked hashes announced by the mempool feed and not yet mined.
///
/// Bounded: past `capacity` the oldest hash is forgotten, so transactions
/// dropped from the node mempool cannot pile up.
pub struct PendingSet {
    hashes: Mutex<SeenCache>,
}

impl PendingSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: Mutex::new(SeenCache::new(capacity)),
        }
    }

    /// Returns `true` if `hash` was not pending yet.
    pub fn insert(&self, hash: &str) -> bool {
        self.lock().insert(hash)
    }

    pub fn remove(&self, hash: &str) -> bool {
        self.lock().remove(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.lock().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, SeenCache> {
        self.hashes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Match `from`/`to` against the index. `None` when neither is tracked.
pub fn correlate_account(
    tx: &AccountTx,
    block_height: i64,
    index: &AddressIndex,
    now: i64,
) -> Option<UnifiedTransaction> {
    let wallets_input: Vec<_> = wallet_reference(index, &tx.from, tx.amount)
        .into_iter()
        .collect();
    let wallets_output: Vec<_> = wallet_reference(index, &tx.to, tx.amount)
        .into_iter()
        .collect();
    if wallets_input.is_empty() && wallets_output.is_empty() {
        return None;
    }

    Some(UnifiedTransaction {
        tx_id: tx.hash.clone(),
        tx_hash: tx.hash.clone(),
        block_height,
        block_time: block_time(block_height, tx.block_time, now),
        mempool_time: now,
        fee: tx.fee,
        exchange_rates: Vec::new(),
        inputs: vec![AddressAmount::new(tx.from.clone(), tx.amount)],
        outputs: vec![AddressAmount::new(tx.to.clone(), tx.amount)],
        wallets_input,
        wallets_output,
    })
}

pub struct AccountIngest {
    pipeline: Arc<Pipeline>,
    pending: PendingSet,
}

impl AccountIngest {
    pub fn new(pipeline: Arc<Pipeline>, config: &IngestConfig) -> Self {
        Self {
            pipeline,
            pending: PendingSet::new(config.seen_cache_capacity),
        }
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// Handle one event. Returns `None` for a mempool event whose hash is
    /// already pending.
    ///
    /// Only tracked mempool transactions stay pending; an untracked hash is
    /// released as soon as it correlates to nothing.
    pub async fn handle(&self, event: AccountEvent) -> Option<ProcessOutcome> {
        let span = account_event_span(&event.tx().hash, event.kind());
        async move {
            match event {
                AccountEvent::Mempool(tx) => {
                    if !self.pending.insert(&tx.hash) {
                        debug!("already pending");
                        return None;
                    }
                    let outcome = self.process(&tx, MEMPOOL_HEIGHT).await;
                    if !outcome.is_ours() {
                        self.pending.remove(&tx.hash);
                    }
                    Some(outcome)
                }
                AccountEvent::Block(tx) => {
                    self.pending.remove(&tx.hash);
                    Some(self.process(&tx, tx.block_height).await)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(&self, tx: &AccountTx, block_height: i64) -> ProcessOutcome {
        let metrics = self.pipeline.metrics();
        metrics.transactions_seen.inc();
        let now = self.pipeline.clock().now();
        match correlate_account(tx, block_height, self.pipeline.index(), now) {
            None => ProcessOutcome::NotOurs,
            Some(unified) => {
                metrics.transactions_matched.inc();
                ProcessOutcome::Processed(self.pipeline.dispatch(unified).await)
            }
        }
    }

    /// Consume `events` until the channel closes or `shutdown` fires.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<AccountEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("account ingest started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event).await;
                    }
                    None => break,
                },
            }
        }
        info!(pending = self.pending.len(), "account ingest stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txflow_types::{User, NO_BLOCK_TIME};

    fn transfer(from: &str, to: &str) -> AccountTx {
        AccountTx {
            hash: "0xabc".into(),
            from: from.into(),
            to: to.into(),
            amount: 1_000,
            fee: 21,
            block_height: MEMPOOL_HEIGHT,
            block_time: None,
        }
    }

    fn index() -> AddressIndex {
        AddressIndex::from_users(&[
            User::new("alice").with_wallet(0, &["0xa"]),
            User::new("bob").with_wallet(1, &["0xb"]),
        ])
        .0
    }

    #[test]
    fn untracked_transfer_is_not_ours() {
        assert!(correlate_account(&transfer("0x1", "0x2"), -1, &index(), 5).is_none());
    }

    #[test]
    fn both_ends_tracked() {
        let tx = correlate_account(&transfer("0xa", "0xb"), -1, &index(), 5).expect("ours");
        assert_eq!(tx.fee, 21);
        assert_eq!(tx.wallets_input[0].user_id, "alice");
        assert_eq!(tx.wallets_output[0].user_id, "bob");
        assert_eq!(tx.wallets_output[0].wallet_index, 1);
        assert_eq!(tx.block_time, NO_BLOCK_TIME);
    }

    #[test]
    fn pending_set_dedups() {
        let pending = PendingSet::new(8);
        assert!(pending.insert("h"));
        assert!(!pending.insert("h"));
        assert!(pending.remove("h"));
        assert!(pending.is_empty());
    }

    #[test]
    fn pending_set_forgets_oldest_past_capacity() {
        let pending = PendingSet::new(3);
        for n in 0..1_000 {
            pending.insert(&format!("0x{n}"));
        }
        assert_eq!(pending.len(), 3);
        assert!(pending.contains("0x999"));
        assert!(!pending.contains("0x0"));
    }
}
