//! Per-user transaction ledger storage trait.
//!
//! Each user owns an ordered sequence of [`LedgerEntry`] values. An entry is
//! identified by its natural key: user, transaction, address and the direction
//! of the view it was written from. Redelivery of a transaction updates the
//! entry in place instead of appending a second one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use txflow_types::{Direction, DirectionalView, TxStatus};

use crate::StoreError;

/// A directional view stored for one tracked address of a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(rename = "txAddress")]
    pub address: String,
    pub wallet_index: u32,
    #[serde(flatten)]
    pub view: DirectionalView,
}

/// Natural key of a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub user_id: String,
    pub tx_id: String,
    pub address: String,
    pub direction: Direction,
}

/// The only fields a redelivered transaction may change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub status: TxStatus,
    pub block_height: i64,
    pub block_time: i64,
}

impl LedgerEntry {
    pub fn key(&self, user_id: &str) -> LedgerKey {
        LedgerKey {
            user_id: user_id.to_string(),
            tx_id: self.view.tx.tx_id.clone(),
            address: self.address.clone(),
            direction: self.view.direction,
        }
    }

    /// Whether this entry is addressed by `key` (ignoring the user, which scopes the ledger).
    pub fn matches(&self, key: &LedgerKey) -> bool {
        self.view.tx.tx_id == key.tx_id
            && self.address == key.address
            && self.view.direction == key.direction
    }

    pub fn apply(&mut self, update: &LedgerUpdate) {
        self.view.status = update.status;
        self.view.tx.block_height = update.block_height;
        self.view.tx.block_time = update.block_time;
    }
}

impl LedgerUpdate {
    pub fn from_view(view: &DirectionalView) -> Self {
        Self {
            status: view.status,
            block_height: view.tx.block_height,
            block_time: view.tx.block_time,
        }
    }
}

/// Trait for the per-user transaction ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Set status, block height and block time on the entry addressed by `key`.
    ///
    /// Returns `Ok(false)` when no such entry exists.
    async fn update_entry(&self, key: &LedgerKey, update: &LedgerUpdate)
        -> Result<bool, StoreError>;

    /// Append `entry` to the user's ledger, creating the ledger if needed.
    ///
    /// Must fail with [`StoreError::Duplicate`] if an entry with the same
    /// natural key already exists, so concurrent first writes cannot both land.
    async fn insert_entry(&self, user_id: &str, entry: LedgerEntry) -> Result<(), StoreError>;

    /// All entries of a user's ledger in insertion order.
    async fn entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError>;
}
