//! Idempotent ledger upsert and wallet activity stamping.
//!
//! Every wallet reference on a view's matched side owns one ledger entry,
//! keyed by `(user, txid, address, direction)`. Replaying the same view
//! updates the entry in place; it never adds a row.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use txflow_store::{LedgerEntry, LedgerKey, LedgerStore, LedgerUpdate, StoreError, UserStore, WalletTouch};
use txflow_types::{Direction, DirectionalView, WalletReference};

use crate::metrics::IngestMetrics;
use crate::resolver::bounded;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Per-view tally of ledger writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

impl UpsertReport {
    pub fn merge(&mut self, other: UpsertReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}

pub struct Persister {
    ledger: Arc<dyn LedgerStore>,
    users: Arc<dyn UserStore>,
    timeout: Duration,
    metrics: Arc<IngestMetrics>,
}

impl Persister {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserStore>,
        timeout: Duration,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            ledger,
            users,
            timeout,
            metrics,
        }
    }

    /// Upsert one ledger entry per wallet reference of `view`.
    ///
    /// A failed reference is logged and counted; the rest are still written.
    pub async fn upsert(&self, view: &DirectionalView) -> UpsertReport {
        let mut report = UpsertReport::default();
        for wallet in view.wallets() {
            match self.upsert_wallet(view, wallet).await {
                Ok(UpsertOutcome::Inserted) => {
                    self.metrics.ledger_inserts.inc();
                    report.inserted += 1;
                }
                Ok(UpsertOutcome::Updated) => {
                    self.metrics.ledger_updates.inc();
                    report.updated += 1;
                }
                Err(e) => {
                    warn!(
                        txid = %view.tx.tx_id,
                        user = %wallet.user_id,
                        address = %wallet.address.address,
                        error = %e,
                        "ledger upsert failed"
                    );
                    self.metrics.persistence_failures.inc();
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Update the entry for `wallet` if present, insert it otherwise.
    ///
    /// An insert that loses a race to a concurrent insert falls back to the
    /// update.
    pub async fn upsert_wallet(
        &self,
        view: &DirectionalView,
        wallet: &WalletReference,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = LedgerKey {
            user_id: wallet.user_id.clone(),
            tx_id: view.tx.tx_id.clone(),
            address: wallet.address.address.clone(),
            direction: view.direction,
        };
        let update = LedgerUpdate::from_view(view);

        if self.update(&key, &update).await? {
            return Ok(UpsertOutcome::Updated);
        }

        let entry = LedgerEntry {
            address: wallet.address.address.clone(),
            wallet_index: wallet.wallet_index,
            view: view.clone(),
        };
        let insert = bounded(
            self.timeout,
            self.ledger.insert_entry(&wallet.user_id, entry),
            StoreError::Timeout,
        )
        .await;
        match insert {
            Ok(()) => Ok(UpsertOutcome::Inserted),
            Err(StoreError::Duplicate(_)) => {
                debug!(txid = %key.tx_id, user = %key.user_id, "concurrent insert, updating instead");
                if self.update(&key, &update).await? {
                    Ok(UpsertOutcome::Updated)
                } else {
                    Err(StoreError::NotFound(format!(
                        "{}/{} vanished after duplicate insert",
                        key.user_id, key.tx_id
                    )))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn update(&self, key: &LedgerKey, update: &LedgerUpdate) -> Result<bool, StoreError> {
        bounded(
            self.timeout,
            self.ledger.update_entry(key, update),
            StoreError::Timeout,
        )
        .await
    }

    /// Stamp activity on every wallet of `view`. Incoming funds also mark the
    /// wallet active. Returns the number of failed stamps.
    pub async fn touch_wallets(&self, view: &DirectionalView, now: i64) -> usize {
        let mut failed = 0;
        for wallet in view.wallets() {
            let touch = WalletTouch {
                user_id: wallet.user_id.clone(),
                wallet_index: wallet.wallet_index,
                address: wallet.address.address.clone(),
                at: now,
                mark_active: view.direction == Direction::Incoming,
            };
            let result = bounded(
                self.timeout,
                self.users.touch_wallet(&touch),
                StoreError::Timeout,
            )
            .await;
            if let Err(e) = result {
                warn!(
                    user = %touch.user_id,
                    wallet = touch.wallet_index,
                    error = %e,
                    "wallet touch failed"
                );
                self.metrics.persistence_failures.inc();
                failed += 1;
            }
        }
        failed
    }
}
