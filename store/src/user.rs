//! Tracked-user storage trait.

use async_trait::async_trait;
use txflow_types::User;

use crate::StoreError;

/// Activity stamp applied to a wallet and one of its addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletTouch {
    pub user_id: String,
    pub wallet_index: u32,
    pub address: String,
    /// Unix seconds written to both `lastActionTime` fields.
    pub at: i64,
    /// Set the wallet status to active (funds arrived).
    pub mark_active: bool,
}

/// Trait for the user/wallet document store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every tracked user. Used to (re)build the address index.
    async fn users(&self) -> Result<Vec<User>, StoreError>;

    /// Stamp wallet and address activity.
    ///
    /// Returns [`StoreError::NotFound`] when the user or wallet does not exist.
    async fn touch_wallet(&self, touch: &WalletTouch) -> Result<(), StoreError>;
}
