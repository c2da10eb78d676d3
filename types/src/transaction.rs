//! Correlated transaction records.
//!
//! A [`UnifiedTransaction`] is the unclassified record built from one raw
//! transaction once at least one of its addresses matched a tracked wallet.
//! Classification turns it into one or two [`DirectionalView`]s, each carrying
//! its own [`TxStatus`]. Keeping the status on the view rather than as an
//! optional field on the unified record means an unclassified record can never
//! reach persistence.

use serde::{Deserialize, Serialize};

use crate::{Direction, TxStatus};

/// An address and the amount it contributed or received, in minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAmount {
    pub address: String,
    pub amount: i64,
}

impl AddressAmount {
    pub fn new(address: impl Into<String>, amount: i64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// A tracked address together with its position inside its wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressWithWalletInfo {
    pub address: String,
    pub address_index: u32,
    pub amount: i64,
}

/// "This transaction side touches wallet `wallet_index` of `user_id`."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletReference {
    pub user_id: String,
    pub wallet_index: u32,
    pub address: AddressWithWalletInfo,
}

/// An exchange-rate sample for one market.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub market: String,
    pub rate: f64,
    pub timestamp: i64,
}

/// The canonical, not-yet-split record of a correlated transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedTransaction {
    pub tx_id: String,
    pub tx_hash: String,
    /// `-1` while only seen in the mempool.
    pub block_height: i64,
    /// Unix seconds, `-1` while only seen in the mempool.
    pub block_time: i64,
    pub mempool_time: i64,
    /// Network fee in minor units. An underestimate when inputs failed to resolve.
    pub fee: i64,
    pub exchange_rates: Vec<RateRecord>,
    /// Every resolved input contribution, tracked or not.
    pub inputs: Vec<AddressAmount>,
    /// Every output destination, tracked or not.
    pub outputs: Vec<AddressAmount>,
    pub wallets_input: Vec<WalletReference>,
    pub wallets_output: Vec<WalletReference>,
}

impl UnifiedTransaction {
    /// Whether any tracked wallet matched on either side.
    pub fn is_ours(&self) -> bool {
        !self.wallets_input.is_empty() || !self.wallets_output.is_empty()
    }

    /// Wallet references on the side that produces views of `direction`.
    pub fn wallets(&self, direction: Direction) -> &[WalletReference] {
        match direction {
            Direction::Outgoing => &self.wallets_input,
            Direction::Incoming => &self.wallets_output,
        }
    }
}

/// A copy of a unified transaction scoped to one side, with its own status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionalView {
    pub direction: Direction,
    #[serde(rename = "txStatus")]
    pub status: TxStatus,
    #[serde(flatten)]
    pub tx: UnifiedTransaction,
}

impl DirectionalView {
    pub fn new(tx: UnifiedTransaction, direction: Direction, status: TxStatus) -> Self {
        Self {
            direction,
            status,
            tx,
        }
    }

    /// Wallet references this view is addressed to.
    pub fn wallets(&self) -> &[WalletReference] {
        self.tx.wallets(self.direction)
    }

    pub fn tx_id(&self) -> &str {
        &self.tx.tx_id
    }
}
