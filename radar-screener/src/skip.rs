use radar_config::ConfigError;
use radar_core::{Price, TickerId};
use radar_data::{FetchError, SupplierError};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Why a ticker did not become a candidate. Only the first failed predicate is reported.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SkipReason {
    #[error("only {available} clean bars, {required} required")]
    InsufficientHistory { required: usize, available: usize },
    #[error("only {available} weekly closes, {required} required")]
    InsufficientWeeklyHistory { required: usize, available: usize },
    #[error("an average needed as a divisor was zero")]
    DegenerateAverage,
    #[error("short averages spread {convergence} apart")]
    NotConverged { convergence: Decimal },
    #[error("long average is not rising")]
    TrendNotRising,
    #[error("close {close} not above highest average {highest_average}")]
    NoBreakout {
        close: Price,
        highest_average: Decimal,
    },
    #[error("close is {bias} above the short average")]
    Overextended { bias: Decimal },
    #[error("volume ratio {ratio} too weak")]
    WeakVolume { ratio: Decimal },
    #[error("volume {volume} below liquidity floor")]
    BelowLiquidityFloor { volume: Decimal },
    #[error("close not above weekly average {weekly_average}")]
    BelowWeeklyTrend { weekly_average: Decimal },
    #[error("series not fetched: {0}")]
    NotFetched(FetchError),
}

impl SkipReason {
    /// Stable snake_case identifier for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::InsufficientHistory { .. } => "insufficient_history",
            SkipReason::InsufficientWeeklyHistory { .. } => "insufficient_weekly_history",
            SkipReason::DegenerateAverage => "degenerate_average",
            SkipReason::NotConverged { .. } => "not_converged",
            SkipReason::TrendNotRising => "trend_not_rising",
            SkipReason::NoBreakout { .. } => "no_breakout",
            SkipReason::Overextended { .. } => "overextended",
            SkipReason::WeakVolume { .. } => "weak_volume",
            SkipReason::BelowLiquidityFloor { .. } => "below_liquidity_floor",
            SkipReason::BelowWeeklyTrend { .. } => "below_weekly_trend",
            SkipReason::NotFetched(_) => "not_fetched",
        }
    }

    /// Both daily and weekly shortfalls count as insufficient history.
    pub fn is_insufficient_history(&self) -> bool {
        matches!(
            self,
            SkipReason::InsufficientHistory { .. } | SkipReason::InsufficientWeeklyHistory { .. }
        )
    }
}

/// A ticker that was evaluated, or should have been, and did not qualify.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Exclusion {
    pub ticker: TickerId,
    pub code: &'static str,
    pub detail: String,
    #[serde(skip)]
    pub reason: SkipReason,
}

impl Exclusion {
    pub fn new(ticker: TickerId, reason: SkipReason) -> Self {
        Self {
            ticker,
            code: reason.code(),
            detail: reason.to_string(),
            reason,
        }
    }
}

/// Errors that stop a scan from producing any outcome.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid screen configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("universe listing unavailable: {0}")]
    Universe(#[from] SupplierError),
    #[error("scan cancelled after {completed} of {total} batches")]
    Cancelled { completed: usize, total: usize },
}

/// Result alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;
