//! Node traits consumed by the pipeline and the triggers.

use async_trait::async_trait;
use txflow_types::RawTx;

use crate::ChainError;

/// Point queries against the node.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    /// Fetch a verbose raw transaction by id.
    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTx, ChainError>;

    /// Current height of the best chain.
    async fn get_block_height(&self) -> Result<i64, ChainError>;
}

/// Transaction id listings used by the mempool, block and resync triggers.
#[async_trait]
pub trait ChainFeed: Send + Sync {
    /// Ids of every transaction currently in the node's mempool.
    async fn mempool_tx_ids(&self) -> Result<Vec<String>, ChainError>;

    /// Ids of every transaction in the block at `height`, in block order.
    async fn block_tx_ids(&self, height: i64) -> Result<Vec<String>, ChainError>;
}
