//! Transaction correlation and classification pipeline.
//!
//! Raw transactions arrive from a trigger (mempool, new block, resync, or
//! an account-model event stream), are matched against the tracked address
//! index, split into one view per matched side, classified by confirmation
//! depth, upserted into each owner's ledger and announced to clients.

pub mod account;
pub mod address_index;
pub mod classify;
pub mod config;
pub mod correlate;
pub mod dispatch;
pub mod error;
pub mod fee;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod rates;
pub mod resolver;
pub mod seen_cache;
pub mod shutdown;
pub mod tracing_spans;
pub mod triggers;

pub use account::{AccountEvent, AccountIngest, AccountTx};
pub use address_index::{AddressIndex, IndexError};
pub use config::IngestConfig;
pub use error::IngestError;
pub use metrics::IngestMetrics;
pub use pipeline::{Pipeline, PipelineDeps, ProcessOutcome, ProcessReport};
pub use shutdown::ShutdownController;
pub use triggers::{resync, BatchReport, BlockListener, MempoolListener};
