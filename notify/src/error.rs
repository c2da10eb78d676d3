use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink refused the message.
    #[error("publish failed: {0}")]
    Publish(String),
}
