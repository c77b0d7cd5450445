use std::collections::HashMap;

use async_trait::async_trait;
use radar_core::{PriceSeries, TickerId};
use thiserror::Error;

/// Per-ticker outcome of a batch fetch.
pub type FetchResponse = HashMap<TickerId, Result<PriceSeries, FetchError>>;

/// A single ticker could not be supplied; the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("no data available for ticker")]
    NotFound,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// The whole batch failed and should be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupplierError {
    #[error("data supplier unavailable: {0}")]
    Unavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Source of daily bars for many tickers at once.
#[async_trait]
pub trait HistoricalDataSupplier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetches roughly `lookback_days` calendar days of bars for each ticker.
    ///
    /// Tickers missing from the returned map are treated as not fetched.
    async fn fetch(
        &self,
        tickers: &[TickerId],
        lookback_days: u32,
    ) -> Result<FetchResponse, SupplierError>;
}
