//! Nullable node: serve raw transactions from memory.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use txflow_chain::{ChainError, ChainFeed, NodeResolver};
use txflow_types::RawTx;

/// A node that answers from an in-memory transaction set.
///
/// Individual transaction ids can be made to fail, and every call can be
/// delayed to exercise caller timeouts.
pub struct NullNode {
    txs: Mutex<HashMap<String, RawTx>>,
    failing: Mutex<HashSet<String>>,
    mempool: Mutex<Vec<String>>,
    blocks: Mutex<BTreeMap<i64, Vec<String>>>,
    height: AtomicI64,
    height_fails: AtomicBool,
    delay_ms: AtomicUsize,
    raw_tx_calls: AtomicUsize,
}

impl NullNode {
    pub fn new(height: i64) -> Self {
        Self {
            txs: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            mempool: Mutex::new(Vec::new()),
            blocks: Mutex::new(BTreeMap::new()),
            height: AtomicI64::new(height),
            height_fails: AtomicBool::new(false),
            delay_ms: AtomicUsize::new(0),
            raw_tx_calls: AtomicUsize::new(0),
        }
    }

    /// Make `tx` resolvable by its id.
    pub fn add_tx(&self, tx: RawTx) {
        self.txs.lock().unwrap().insert(tx.txid.clone(), tx);
    }

    /// Add `tx` and list it in the mempool.
    pub fn add_mempool_tx(&self, tx: RawTx) {
        self.mempool.lock().unwrap().push(tx.txid.clone());
        self.add_tx(tx);
    }

    /// Add `tx` to the block at `height`, removing it from the mempool.
    pub fn add_block_tx(&self, height: i64, tx: RawTx) {
        self.mempool.lock().unwrap().retain(|id| id != &tx.txid);
        self.blocks
            .lock()
            .unwrap()
            .entry(height)
            .or_default()
            .push(tx.txid.clone());
        self.add_tx(tx);
    }

    /// Make resolution of `txid` fail with `NodeUnavailable`.
    pub fn fail_tx(&self, txid: &str) {
        self.failing.lock().unwrap().insert(txid.to_string());
    }

    pub fn set_height(&self, height: i64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn fail_height(&self, fail: bool) {
        self.height_fails.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Number of `get_raw_transaction` calls served so far.
    pub fn raw_tx_calls(&self) -> usize {
        self.raw_tx_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
    }
}

impl Default for NullNode {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl NodeResolver for NullNode {
    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTx, ChainError> {
        self.raw_tx_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.failing.lock().unwrap().contains(txid) {
            return Err(ChainError::NodeUnavailable(format!("injected failure for {txid}")));
        }
        self.txs
            .lock()
            .unwrap()
            .get(txid)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(txid.to_string()))
    }

    async fn get_block_height(&self) -> Result<i64, ChainError> {
        self.pause().await;
        if self.height_fails.load(Ordering::SeqCst) {
            return Err(ChainError::NodeUnavailable("injected height failure".into()));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl ChainFeed for NullNode {
    async fn mempool_tx_ids(&self) -> Result<Vec<String>, ChainError> {
        self.pause().await;
        Ok(self.mempool.lock().unwrap().clone())
    }

    async fn block_tx_ids(&self, height: i64) -> Result<Vec<String>, ChainError> {
        self.pause().await;
        self.blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("block {height}")))
    }
}
