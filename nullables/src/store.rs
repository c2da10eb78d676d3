//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use txflow_store::{
    LedgerEntry, LedgerKey, LedgerStore, LedgerUpdate, RateStore, StoreError, UserStore,
    WalletTouch,
};
use txflow_types::{RateRecord, User, WalletStatus};

/// An in-memory user + ledger + rate store.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    users: Mutex<BTreeMap<String, User>>,
    ledgers: Mutex<HashMap<String, Vec<LedgerEntry>>>,
    rates: Mutex<Vec<RateRecord>>,
    failing_ledgers: Mutex<HashSet<String>>,
    rates_fail: AtomicBool,
    ledger_writes: AtomicUsize,
    touches: AtomicUsize,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(BTreeMap::new()),
            ledgers: Mutex::new(HashMap::new()),
            rates: Mutex::new(Vec::new()),
            failing_ledgers: Mutex::new(HashSet::new()),
            rates_fail: AtomicBool::new(false),
            ledger_writes: AtomicUsize::new(0),
            touches: AtomicUsize::new(0),
        }
    }

    /// Build a store pre-populated with `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        for user in users {
            store.add_user(user);
        }
        store
    }

    pub fn add_user(&self, user: User) {
        self.users
            .lock()
            .unwrap()
            .insert(user.user_id.clone(), user);
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.users.lock().unwrap().get(user_id).cloned()
    }

    pub fn add_rate(&self, record: RateRecord) {
        self.rates.lock().unwrap().push(record);
    }

    /// Make every ledger write for `user_id` fail with a backend error.
    pub fn fail_ledger_for(&self, user_id: &str) {
        self.failing_ledgers
            .lock()
            .unwrap()
            .insert(user_id.to_string());
    }

    pub fn fail_rates(&self, fail: bool) {
        self.rates_fail.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of a user's ledger (empty if the user has none).
    pub fn ledger(&self, user_id: &str) -> Vec<LedgerEntry> {
        self.ledgers
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of ledger update/insert calls received, successful or not.
    pub fn ledger_writes(&self) -> usize {
        self.ledger_writes.load(Ordering::SeqCst)
    }

    /// Number of wallet touch calls received.
    pub fn touches(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    fn check_ledger(&self, user_id: &str) -> Result<(), StoreError> {
        self.ledger_writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_ledgers.lock().unwrap().contains(user_id) {
            return Err(StoreError::Backend(format!(
                "injected ledger failure for {user_id}"
            )));
        }
        Ok(())
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for NullStore {
    async fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }

    async fn touch_wallet(&self, touch: &WalletTouch) -> Result<(), StoreError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&touch.user_id)
            .ok_or_else(|| StoreError::NotFound(touch.user_id.clone()))?;
        let wallet = user.wallet_mut(touch.wallet_index).ok_or_else(|| {
            StoreError::NotFound(format!("{}/{}", touch.user_id, touch.wallet_index))
        })?;
        wallet.last_action_time = touch.at;
        if touch.mark_active {
            wallet.status = WalletStatus::Active;
        }
        if let Some(addr) = wallet
            .addresses
            .iter_mut()
            .find(|a| a.address == touch.address)
        {
            addr.last_action_time = touch.at;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for NullStore {
    async fn update_entry(
        &self,
        key: &LedgerKey,
        update: &LedgerUpdate,
    ) -> Result<bool, StoreError> {
        self.check_ledger(&key.user_id)?;
        let mut ledgers = self.ledgers.lock().unwrap();
        let entry = ledgers
            .get_mut(&key.user_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.matches(key)));
        match entry {
            Some(entry) => {
                entry.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_entry(&self, user_id: &str, entry: LedgerEntry) -> Result<(), StoreError> {
        self.check_ledger(user_id)?;
        let key = entry.key(user_id);
        let mut ledgers = self.ledgers.lock().unwrap();
        let entries = ledgers.entry(user_id.to_string()).or_default();
        if entries.iter().any(|e| e.matches(&key)) {
            return Err(StoreError::Duplicate(format!(
                "{user_id}/{}/{}",
                key.tx_id, key.address
            )));
        }
        entries.push(entry);
        Ok(())
    }

    async fn entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.ledger(user_id))
    }
}

#[async_trait]
impl RateStore for NullStore {
    async fn latest_rate(&self, market: &str) -> Result<Option<RateRecord>, StoreError> {
        if self.rates_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected rate failure".into()));
        }
        Ok(self
            .rates
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.market == market)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txflow_types::{Direction, DirectionalView, TxStatus, UnifiedTransaction};

    fn entry(tx_id: &str, status: TxStatus) -> LedgerEntry {
        let tx = UnifiedTransaction {
            tx_id: tx_id.into(),
            tx_hash: tx_id.into(),
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
            address: "addr".into(),
            wallet_index: 0,
            view: DirectionalView::new(tx, status.direction(), status),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_key() {
        let store = NullStore::new();
        let e = entry("t1", TxStatus::AppearedInMempoolIncoming);
        store.insert_entry("u1", e.clone()).await.unwrap();
        let err = store.insert_entry("u1", e).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.ledger("u1").len(), 1);
    }

    #[tokio::test]
    async fn update_reports_missing_entry() {
        let store = NullStore::new();
        let key = LedgerKey {
            user_id: "u1".into(),
            tx_id: "t1".into(),
            address: "addr".into(),
            direction: Direction::Incoming,
        };
        let update = LedgerUpdate {
            status: TxStatus::AppearedInBlockIncoming,
            block_height: 5,
            block_time: 9,
        };
        assert!(!store.update_entry(&key, &update).await.unwrap());
        store
            .insert_entry("u1", entry("t1", TxStatus::AppearedInMempoolIncoming))
            .await
            .unwrap();
        assert!(store.update_entry(&key, &update).await.unwrap());
        assert_eq!(store.ledger("u1")[0].view.status, TxStatus::AppearedInBlockIncoming);
    }

    #[tokio::test]
    async fn failing_ledger_counts_writes() {
        let store = NullStore::new();
        store.fail_ledger_for("u1");
        let result = store
            .insert_entry("u1", entry("t1", TxStatus::AppearedInMempoolIncoming))
            .await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(store.ledger_writes(), 1);
    }

    #[tokio::test]
    async fn touch_marks_wallet_active() {
        let store = NullStore::with_users([User::new("u1").with_wallet(0, &["a0"])]);
        store
            .touch_wallet(&WalletTouch {
                user_id: "u1".into(),
                wallet_index: 0,
                address: "a0".into(),
                at: 77,
                mark_active: true,
            })
            .await
            .unwrap();
        let user = store.user("u1").unwrap();
        let wallet = user.wallet(0).unwrap();
        assert_eq!(wallet.status, WalletStatus::Active);
        assert_eq!(wallet.last_action_time, 77);
        assert_eq!(wallet.addresses[0].last_action_time, 77);
    }

    #[tokio::test]
    async fn touch_unknown_wallet_is_not_found() {
        let store = NullStore::with_users([User::new("u1").with_wallet(0, &["a0"])]);
        let touch = WalletTouch {
            user_id: "u1".into(),
            wallet_index: 9,
            address: "a0".into(),
            at: 1,
            mark_active: false,
        };
        assert!(matches!(
            store.touch_wallet(&touch).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn latest_rate_picks_newest_per_market() {
        let store = NullStore::new();
        for (market, rate, ts) in [("Gdax", 1.0, 10), ("Gdax", 2.0, 30), ("Poloniex", 3.0, 20)] {
            store.add_rate(RateRecord {
                market: market.into(),
                rate,
                timestamp: ts,
            });
        }
        assert_eq!(store.latest_rate("Gdax").await.unwrap().unwrap().rate, 2.0);
        assert!(store.latest_rate("Kraken").await.unwrap().is_none());
        store.fail_rates(true);
        assert!(store.latest_rate("Gdax").await.is_err());
    }
}
