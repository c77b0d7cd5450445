use chrono::{DateTime, Utc};
use radar_core::{CandidateResult, TickerId};
use serde::Serialize;

use crate::skip::Exclusion;

/// A batch whose fetch failed or timed out. Its tickers are absent from the outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub tickers: Vec<TickerId>,
    pub reason: String,
}

/// Everything one scan produced.
#[derive(Clone, Debug, Serialize)]
pub struct ScanOutcome {
    /// Qualifying tickers after ranking and capping.
    pub candidates: Vec<CandidateResult>,
    /// Tickers that were looked at and did not qualify, in universe order.
    pub exclusions: Vec<Exclusion>,
    pub failed_batches: Vec<BatchFailure>,
    pub universe_size: usize,
    /// Tickers that reached the evaluation engine.
    pub evaluated: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ScanOutcome {
    pub(crate) fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            candidates: Vec::new(),
            exclusions: Vec::new(),
            failed_batches: Vec::new(),
            universe_size: 0,
            evaluated: 0,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Whether any batch failed, leaving the result partial.
    pub fn is_degraded(&self) -> bool {
        !self.failed_batches.is_empty()
    }

    pub fn exclusion_for(&self, ticker: &TickerId) -> Option<&Exclusion> {
        self.exclusions.iter().find(|exclusion| &exclusion.ticker == ticker)
    }

    /// Tickers dropped with a failed batch.
    pub fn unscanned(&self) -> impl Iterator<Item = &TickerId> {
        self.failed_batches.iter().flat_map(|batch| batch.tickers.iter())
    }
}
