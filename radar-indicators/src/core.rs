use std::collections::VecDeque;

use radar_core::CleanBar;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while constructing indicators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// The requested lookback period cannot produce a value.
    #[error("{name} period must be greater than zero (got {period})")]
    InvalidPeriod {
        /// Indicator name.
        name: &'static str,
        /// Rejected period.
        period: usize,
    },
}

impl IndicatorError {
    pub(crate) fn invalid_period(name: &'static str, period: usize) -> Self {
        Self::InvalidPeriod { name, period }
    }
}

/// Values that can be fed into a decimal indicator.
pub trait Input {
    /// The scalar the indicator consumes.
    fn value(&self) -> Decimal;
}

impl Input for Decimal {
    fn value(&self) -> Decimal {
        *self
    }
}

impl Input for CleanBar {
    fn value(&self) -> Decimal {
        self.close
    }
}

/// A streaming indicator consuming one input at a time.
pub trait Indicator {
    /// Input type.
    type Input;
    /// Output type.
    type Output;

    /// Feeds the next input, returning a value once the indicator is warmed up.
    fn next(&mut self, input: Self::Input) -> Option<Self::Output>;

    /// Clears all internal state.
    fn reset(&mut self);

    /// Feeds every input and returns the value after the final one.
    fn latest<T>(&mut self, inputs: T) -> Option<Self::Output>
    where
        T: IntoIterator<Item = Self::Input>,
        Self: Sized,
    {
        inputs.into_iter().fold(None, |_, input| self.next(input))
    }

    /// Feeds every input and keeps the last `count` produced values, oldest first.
    fn trailing<T>(&mut self, inputs: T, count: usize) -> Vec<Self::Output>
    where
        T: IntoIterator<Item = Self::Input>,
        Self: Sized,
    {
        let mut kept = VecDeque::with_capacity(count);
        for input in inputs {
            if let Some(output) = self.next(input) {
                if kept.len() == count {
                    kept.pop_front();
                }
                if count > 0 {
                    kept.push_back(output);
                }
            }
        }
        kept.into()
    }
}

pub(crate) fn decimal_from_usize(value: usize) -> Decimal {
    Decimal::from(value as u64)
}
