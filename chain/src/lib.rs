//! Node collaborators for the txflow pipeline.
//!
//! [`NodeResolver`] answers the two questions the pipeline asks of a node:
//! "what does transaction X look like" and "how tall is the chain".
//! [`ChainFeed`] lists the transaction ids the triggers should feed in.
//! [`BitcoindClient`] implements both over bitcoind-compatible JSON-RPC.

pub mod bitcoind;
pub mod error;
pub mod resolver;

pub use bitcoind::{parse_verbose_transaction, BitcoindClient};
pub use error::ChainError;
pub use resolver::{ChainFeed, NodeResolver};
