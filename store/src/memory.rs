//! In-process store backend for single-node deployments.
//!
//! Users, ledgers and rate history live in memory behind `RwLock`s and are
//! lost on restart. A poisoned lock is recovered rather than propagated: the
//! guarded maps are never left half-written.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use txflow_types::{RateRecord, User, WalletStatus};

use crate::{
    LedgerEntry, LedgerKey, LedgerStore, LedgerUpdate, RateStore, StoreError, UserStore,
    WalletTouch,
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<BTreeMap<String, User>>,
    ledgers: RwLock<HashMap<String, Vec<LedgerEntry>>>,
    /// Most recent record per market.
    rates: RwLock<HashMap<String, RateRecord>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tracked user.
    pub fn put_user(&self, user: User) {
        write(&self.users).insert(user.user_id.clone(), user);
    }

    /// Record a rate sample. Older samples than the one held are ignored.
    pub fn record_rate(&self, record: RateRecord) {
        let mut rates = write(&self.rates);
        match rates.get(&record.market) {
            Some(held) if held.timestamp > record.timestamp => {}
            _ => {
                rates.insert(record.market.clone(), record);
            }
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(read(&self.users).values().cloned().collect())
    }

    async fn touch_wallet(&self, touch: &WalletTouch) -> Result<(), StoreError> {
        let mut users = write(&self.users);
        let wallet = users
            .get_mut(&touch.user_id)
            .and_then(|user| user.wallet_mut(touch.wallet_index))
            .ok_or_else(|| {
                StoreError::NotFound(format!("{}/{}", touch.user_id, touch.wallet_index))
            })?;
        wallet.last_action_time = touch.at;
        if touch.mark_active {
            wallet.status = WalletStatus::Active;
        }
        if let Some(address) = wallet
            .addresses
            .iter_mut()
            .find(|a| a.address == touch.address)
        {
            address.last_action_time = touch.at;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn update_entry(
        &self,
        key: &LedgerKey,
        update: &LedgerUpdate,
    ) -> Result<bool, StoreError> {
        let mut ledgers = write(&self.ledgers);
        let Some(entry) = ledgers
            .get_mut(&key.user_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.matches(key)))
        else {
            return Ok(false);
        };
        entry.apply(update);
        Ok(true)
    }

    async fn insert_entry(&self, user_id: &str, entry: LedgerEntry) -> Result<(), StoreError> {
        let key = entry.key(user_id);
        let mut ledgers = write(&self.ledgers);
        let entries = ledgers.entry(user_id.to_string()).or_default();
        if entries.iter().any(|e| e.matches(&key)) {
            return Err(StoreError::Duplicate(format!(
                "{user_id}/{}/{}/{}",
                key.tx_id,
                key.address,
                key.direction.as_str()
            )));
        }
        entries.push(entry);
        Ok(())
    }

    async fn entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(read(&self.ledgers)
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn latest_rate(&self, market: &str) -> Result<Option<RateRecord>, StoreError> {
        Ok(read(&self.rates).get(market).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txflow_types::{Direction, DirectionalView, TxStatus, UnifiedTransaction};

    fn entry(status: TxStatus) -> LedgerEntry {
        let tx = UnifiedTransaction {
            tx_id: "t1".into(),
            tx_hash: "t1".into(),
            block_height: -1,
            block_time: -1,
            mempool_time: 1,
            fee: 0,
            exchange_rates: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            wallets_input: Vec::new(),
            wallets_output: Vec::new(),
        };
        LedgerEntry {
            address: "a0".into(),
            wallet_index: 0,
            view: DirectionalView::new(tx, status.direction(), status),
        }
    }

    #[tokio::test]
    async fn ledger_is_keyed_by_direction() {
        let store = MemoryStore::new();
        store
            .insert_entry("u1", entry(TxStatus::AppearedInMempoolOutgoing))
            .await
            .unwrap();
        store
            .insert_entry("u1", entry(TxStatus::AppearedInMempoolIncoming))
            .await
            .unwrap();
        let err = store
            .insert_entry("u1", entry(TxStatus::AppearedInMempoolIncoming))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let key = LedgerKey {
            user_id: "u1".into(),
            tx_id: "t1".into(),
            address: "a0".into(),
            direction: Direction::Incoming,
        };
        let update = LedgerUpdate {
            status: TxStatus::AppearedInBlockIncoming,
            block_height: 10,
            block_time: 99,
        };
        assert!(store.update_entry(&key, &update).await.unwrap());

        let entries = store.entries("u1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].view.status, TxStatus::AppearedInMempoolOutgoing);
        assert_eq!(entries[1].view.status, TxStatus::AppearedInBlockIncoming);
        assert!(store.entries("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn touch_stamps_wallet_and_address() {
        let store = MemoryStore::new();
        store.put_user(User::new("u1").with_wallet(3, &["a0", "a1"]));
        let touch = WalletTouch {
            user_id: "u1".into(),
            wallet_index: 3,
            address: "a1".into(),
            at: 42,
            mark_active: true,
        };
        store.touch_wallet(&touch).await.unwrap();

        let users = store.users().await.unwrap();
        let wallet = users[0].wallet(3).unwrap();
        assert_eq!(wallet.status, WalletStatus::Active);
        assert_eq!(wallet.last_action_time, 42);
        assert_eq!(wallet.addresses[1].last_action_time, 42);
        assert_eq!(wallet.addresses[0].last_action_time, 0);

        let missing = WalletTouch {
            wallet_index: 9,
            ..touch
        };
        assert!(matches!(
            store.touch_wallet(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn newest_rate_wins_regardless_of_arrival_order() {
        let store = MemoryStore::new();
        for (rate, timestamp) in [(2.0, 30), (1.0, 10)] {
            store.record_rate(RateRecord {
                market: "Gdax".into(),
                rate,
                timestamp,
            });
        }
        assert_eq!(store.latest_rate("Gdax").await.unwrap().unwrap().rate, 2.0);
        assert!(store.latest_rate("Kraken").await.unwrap().is_none());
    }
}
