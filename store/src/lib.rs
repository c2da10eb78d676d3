//! Abstract storage traits for the txflow pipeline.
//!
//! Every storage backend (a document database in production, [`MemoryStore`]
//! for single-node runs, the nullables for testing) implements these traits.
//! The pipeline depends only on the traits.
//! All methods are async because every real backend sits behind network I/O.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod rates;
pub mod user;

pub use error::StoreError;
pub use ledger::{LedgerEntry, LedgerKey, LedgerStore, LedgerUpdate};
pub use memory::MemoryStore;
pub use rates::RateStore;
pub use user::{UserStore, WalletTouch};
