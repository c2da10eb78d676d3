use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid node response: {0}")]
    InvalidResponse(String),

    #[error("node call timed out after {0} ms")]
    Timeout(u64),
}
