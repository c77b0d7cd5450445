//! Week-end resampling of daily closes.

use chrono::{Datelike, IsoWeek};
use radar_core::CleanBar;
use rust_decimal::Decimal;

use crate::core::Indicator;

/// Emits the last close of each ISO week (Monday to Sunday) once the following week starts.
///
/// The week still in progress is available through [`WeeklyCloses::pending`].
#[derive(Debug, Clone, Default)]
pub struct WeeklyCloses {
    current: Option<(IsoWeek, Decimal)>,
}

impl WeeklyCloses {
    /// Creates an empty resampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close of the most recent bar in the week still in progress.
    pub fn pending(&self) -> Option<Decimal> {
        self.current.map(|(_, close)| close)
    }

    /// Week-end closes for every week in `bars`, the trailing partial week included.
    pub fn resample(bars: &[CleanBar]) -> Vec<Decimal> {
        let mut resampler = Self::new();
        let mut closes: Vec<Decimal> = bars
            .iter()
            .filter_map(|bar| resampler.next(*bar))
            .collect();
        closes.extend(resampler.pending());
        closes
    }
}

impl Indicator for WeeklyCloses {
    type Input = CleanBar;
    type Output = Decimal;

    fn next(&mut self, input: Self::Input) -> Option<Self::Output> {
        let week = input.date.iso_week();
        match self.current.replace((week, input.close)) {
            Some((previous, close)) if previous != week => Some(close),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.current = None;
    }
}
