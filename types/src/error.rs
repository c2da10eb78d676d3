//! Error type for conversions between wire values and domain types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("unknown transaction status code: {0}")]
    UnknownStatusCode(u8),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}
