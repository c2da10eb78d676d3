//! Exchange-rate history storage trait.

use async_trait::async_trait;
use txflow_types::RateRecord;

use crate::StoreError;

#[async_trait]
pub trait RateStore: Send + Sync {
    /// The most recent record for `market`, or `None` if the market has no history.
    async fn latest_rate(&self, market: &str) -> Result<Option<RateRecord>, StoreError>;
}
