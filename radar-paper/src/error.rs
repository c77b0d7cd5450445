use radar_core::TickerId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias for account state transitions.
pub type AccountResult<T> = Result<T, AccountError>;

/// A fill that would leave the account in an invalid state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("lots must be greater than zero")]
    ZeroLots,
    #[error("price must be positive (got {0})")]
    NonPositivePrice(Decimal),
    #[error("insufficient cash: {required} required, {available} available")]
    InsufficientCash { required: Decimal, available: Decimal },
    #[error("cannot sell {requested} lots of {ticker}, holding {held}")]
    InsufficientHoldings {
        ticker: TickerId,
        requested: u64,
        held: u64,
    },
}

/// Result alias for account persistence.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type surfaced by account stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
