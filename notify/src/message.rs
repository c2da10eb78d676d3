//! Notification payload sent to clients.

use serde::{Deserialize, Serialize};
use txflow_types::{Direction, DirectionalView, TxStatus, WalletReference};

/// One directional message for one tracked address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxNotification {
    pub user_id: String,
    #[serde(rename = "txid")]
    pub tx_id: String,
    pub address: String,
    /// Amount moved by this address, in minor units.
    pub amount: i64,
    pub direction: Direction,
    /// Status wire code.
    pub transaction_type: TxStatus,
}

impl TxNotification {
    /// Build the message for `wallet` as seen from `view`.
    pub fn for_wallet(view: &DirectionalView, wallet: &WalletReference) -> Self {
        Self {
            user_id: wallet.user_id.clone(),
            tx_id: view.tx.tx_id.clone(),
            address: wallet.address.address.clone(),
            amount: wallet.address.amount,
            direction: view.direction,
            transaction_type: view.status,
        }
    }
}
