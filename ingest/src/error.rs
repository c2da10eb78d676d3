use thiserror::Error;

use crate::address_index::IndexError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] txflow_store::StoreError),

    #[error("node error: {0}")]
    Chain(#[from] txflow_chain::ChainError),

    #[error("address index error: {0}")]
    Index(#[from] IndexError),

    #[error("config error: {0}")]
    Config(String),
}
