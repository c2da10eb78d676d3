//! Fundamental types for the txflow transaction pipeline.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! raw node transactions, tracked users and wallets, the unified and directional
//! transaction records, confirmation statuses, amounts and time helpers.

pub mod amount;
pub mod error;
pub mod network;
pub mod params;
pub mod raw;
pub mod state;
pub mod time;
pub mod transaction;
pub mod user;

pub use amount::{checked_total, money_range, to_minor_units, MAX_MONEY, MINOR_UNITS_PER_COIN};
pub use error::TypesError;
pub use network::NetworkId;
pub use params::{CONFIRMATIONS_REQUIRED, MEMPOOL_HEIGHT, NO_BLOCK_TIME};
pub use raw::{RawInput, RawOutput, RawTx};
pub use state::{Direction, TxStatus, WalletStatus};
pub use time::{unix_now, Clock, SystemClock};
pub use transaction::{
    AddressAmount, AddressWithWalletInfo, DirectionalView, RateRecord, UnifiedTransaction,
    WalletReference,
};
pub use user::{AddressOwner, TrackedAddress, User, Wallet};
