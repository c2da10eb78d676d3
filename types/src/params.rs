//! Chain constants shared by the classifier and the triggers.

/// Block height used for transactions that have only been seen in the mempool.
pub const MEMPOOL_HEIGHT: i64 = -1;

/// Block time used for transactions that are not yet in a block.
pub const NO_BLOCK_TIME: i64 = -1;

/// Number of blocks on top of a transaction's block before it counts as confirmed.
pub const CONFIRMATIONS_REQUIRED: i64 = 6;
