//! Breakout screening for daily equity bars.
//!
//! [`engine::evaluate`] decides whether one ticker qualifies; [`Screener`] drives
//! that decision across a universe fetched in concurrent batches.

pub mod engine;
pub mod outcome;
mod pipeline;
pub mod progress;
pub mod ranking;
mod skip;

pub use engine::{evaluate, IndicatorSnapshot};
pub use outcome::{BatchFailure, ScanOutcome};
pub use pipeline::Screener;
pub use progress::ScanProgress;
pub use ranking::rank;
pub use skip::{Exclusion, ScanError, ScanResult, SkipReason};
