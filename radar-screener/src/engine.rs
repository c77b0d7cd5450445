//! Per-ticker breakout evaluation.
//!
//! [`evaluate`] is pure: it reads one series and one configuration and either
//! produces a [`CandidateResult`] or names the first predicate that failed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use radar_config::{ScreenConfig, StopLossPolicy};
use radar_core::{shares_to_lots, CandidateResult, CleanBar, Price, PriceSeries, StrategyLabel};
use radar_indicators::indicators::{Sma, WeeklyCloses};
use radar_indicators::{Indicator, Input};
use rust_decimal::Decimal;

use crate::skip::SkipReason;

/// Window used by the "reclaimed monthly average" label.
const MONTHLY_WINDOW: usize = 20;
const SURGE_RATIO: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
const SQUEEZE_CONVERGENCE: Decimal = Decimal::from_parts(15, 0, 0, false, 3);
const ACCUMULATION_RATIO: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
const ACCUMULATION_BIAS: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Precision of the reported ratios.
const RATIO_DP: u32 = 6;

/// Indicator values computed on the most recent bar of a cleaned series.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorSnapshot {
    pub as_of: NaiveDate,
    pub close: Price,
    pub volume: Decimal,
    /// Simple moving average of closes per configured window.
    pub averages: BTreeMap<usize, Decimal>,
    /// Long-window average one bar earlier, when history allows.
    pub previous_long_average: Option<Decimal>,
    pub bias_average: Decimal,
    pub volume_average: Decimal,
    /// 20-bar average on the previous and latest bar, for labelling.
    pub monthly_averages: Option<(Decimal, Decimal)>,
    pub previous_close: Option<Price>,
    /// Average of the last `weekly_window` ISO-week closes.
    pub weekly_average: Option<Decimal>,
    /// Number of weekly closes available.
    pub weeks_available: usize,
}

impl IndicatorSnapshot {
    /// Computes every indicator the predicates need. `bars` must hold at least
    /// `config.required_history()` entries.
    pub fn compute(bars: &[CleanBar], config: &ScreenConfig) -> Option<Self> {
        let last = *bars.last()?;
        let mut averages = BTreeMap::new();
        for window in &config.windows {
            averages.insert(*window, trailing_sma(bars, *window, 1).pop()?);
        }
        let long = config.long_window();
        let previous_long_average = match trailing_sma(bars, long, 2).as_slice() {
            [previous, _] => Some(*previous),
            _ => None,
        };
        let bias_average = trailing_sma(bars, config.bias_window, 1).pop()?;
        let volumes: Vec<Decimal> = bars.iter().map(|bar| bar.volume).collect();
        let volume_average = trailing_sma(&volumes, config.volume_window, 1).pop()?;

        let monthly_averages = match trailing_sma(bars, MONTHLY_WINDOW, 2).as_slice() {
            [previous, latest] => Some((*previous, *latest)),
            _ => None,
        };
        let previous_close = bars.len().checked_sub(2).map(|idx| bars[idx].close);

        let (weekly_average, weeks_available) = if config.use_weekly_trend_gate {
            let weekly = WeeklyCloses::resample(bars);
            (
                trailing_sma(&weekly, config.weekly_window, 1).pop(),
                weekly.len(),
            )
        } else {
            (None, 0)
        };

        Some(Self {
            as_of: last.date,
            close: last.close,
            volume: last.volume,
            averages,
            previous_long_average,
            bias_average,
            volume_average,
            monthly_averages,
            previous_close,
            weekly_average,
            weeks_available,
        })
    }

    fn average(&self, window: usize) -> Option<Decimal> {
        self.averages.get(&window).copied()
    }
}

/// Averages over the final `period + count - 1` inputs, keeping the last `count` values.
fn trailing_sma<I: Input + Copy>(inputs: &[I], period: usize, count: usize) -> Vec<Decimal> {
    let Ok(mut sma) = Sma::<I>::new(period) else {
        return Vec::new();
    };
    let start = inputs.len().saturating_sub(period + count - 1);
    sma.trailing(inputs[start..].iter().copied(), count)
}

/// Spread of the short averages relative to their minimum.
pub fn convergence(short_averages: &[Decimal]) -> Result<Decimal, SkipReason> {
    let (Some(min), Some(max)) = (
        short_averages.iter().copied().min(),
        short_averages.iter().copied().max(),
    ) else {
        return Err(SkipReason::DegenerateAverage);
    };
    (max - min)
        .checked_div(min)
        .ok_or(SkipReason::DegenerateAverage)
}

/// Applies every predicate in order and builds the candidate row on success.
pub fn evaluate(series: &PriceSeries, config: &ScreenConfig) -> Result<CandidateResult, SkipReason> {
    let bars = series.cleaned();
    let required = config.required_history();
    if bars.len() < required {
        return Err(SkipReason::InsufficientHistory {
            required,
            available: bars.len(),
        });
    }
    let snapshot = IndicatorSnapshot::compute(&bars, config).ok_or(SkipReason::InsufficientHistory {
        required,
        available: bars.len(),
    })?;

    let short: Vec<Decimal> = config
        .short_windows()
        .into_iter()
        .filter_map(|window| snapshot.average(window))
        .collect();
    let convergence = convergence(&short)?;
    if convergence > config.convergence_threshold {
        return Err(SkipReason::NotConverged {
            convergence: convergence.round_dp(RATIO_DP),
        });
    }

    let long_window = config.long_window();
    let long_average = snapshot
        .average(long_window)
        .ok_or(SkipReason::DegenerateAverage)?;
    if config.use_trend_rising_gate {
        let rising = snapshot
            .previous_long_average
            .is_some_and(|previous| long_average > previous);
        if !rising {
            return Err(SkipReason::TrendNotRising);
        }
    }

    let highest = snapshot
        .averages
        .values()
        .copied()
        .max()
        .ok_or(SkipReason::DegenerateAverage)?;
    if snapshot.close <= highest {
        return Err(SkipReason::NoBreakout {
            close: snapshot.close,
            highest_average: highest.round_dp(4),
        });
    }

    let bias = (snapshot.close - snapshot.bias_average)
        .checked_div(snapshot.bias_average)
        .ok_or(SkipReason::DegenerateAverage)?;
    if bias > config.bias_threshold {
        return Err(SkipReason::Overextended {
            bias: bias.round_dp(RATIO_DP),
        });
    }

    // A zero average means no trading at all over the window.
    let volume_ratio = snapshot
        .volume
        .checked_div(snapshot.volume_average)
        .unwrap_or(Decimal::ZERO);
    if volume_ratio <= config.volume_multiplier {
        return Err(SkipReason::WeakVolume {
            ratio: volume_ratio.round_dp(RATIO_DP),
        });
    }

    if snapshot.volume < config.min_volume_floor {
        return Err(SkipReason::BelowLiquidityFloor {
            volume: snapshot.volume,
        });
    }

    if config.use_weekly_trend_gate {
        let Some(weekly) = snapshot.weekly_average else {
            return Err(SkipReason::InsufficientWeeklyHistory {
                required: config.weekly_window,
                available: snapshot.weeks_available,
            });
        };
        if snapshot.close <= weekly {
            return Err(SkipReason::BelowWeeklyTrend {
                weekly_average: weekly.round_dp(4),
            });
        }
    }

    let reference = match config.stop_loss_policy {
        StopLossPolicy::ClusterMin => short.iter().copied().min().unwrap_or(long_average),
        StopLossPolicy::LongAverage => long_average,
    };
    let stop_loss = (reference * (Decimal::ONE - config.stop_loss_buffer)).round_dp(2);
    let take_profit = (snapshot.close * (Decimal::ONE + config.take_profit_pct)).round_dp(2);

    Ok(CandidateResult {
        ticker: series.ticker.clone(),
        industry: None,
        as_of: snapshot.as_of,
        price: snapshot.close,
        volume_lots: shares_to_lots(snapshot.volume),
        stop_loss,
        take_profit,
        strategy: Some(label(&snapshot, convergence, bias, volume_ratio)),
        convergence: convergence.round_dp(RATIO_DP),
        bias: bias.round_dp(RATIO_DP),
        volume_ratio: volume_ratio.round_dp(RATIO_DP),
    })
}

/// First matching pattern wins.
fn label(
    snapshot: &IndicatorSnapshot,
    convergence: Decimal,
    bias: Decimal,
    volume_ratio: Decimal,
) -> StrategyLabel {
    if volume_ratio > SURGE_RATIO {
        return StrategyLabel::VolumeSurge;
    }
    if convergence < SQUEEZE_CONVERGENCE {
        return StrategyLabel::TightSqueeze;
    }
    if let (Some((previous_average, latest_average)), Some(previous_close)) =
        (snapshot.monthly_averages, snapshot.previous_close)
    {
        if snapshot.close > latest_average && previous_close <= previous_average {
            return StrategyLabel::ReclaimedMonthlyAverage;
        }
    }
    if volume_ratio > ACCUMULATION_RATIO && bias < ACCUMULATION_BIAS {
        return StrategyLabel::QuietAccumulation;
    }
    StrategyLabel::SteadyBreakout
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_test_utils::{gentle_breakout, SeriesBuilder};
    use rust_decimal_macros::dec;

    #[test]
    fn convergence_is_spread_over_minimum() {
        assert_eq!(
            convergence(&[dec!(102), dec!(101), dec!(100)]).unwrap(),
            dec!(0.02)
        );
        assert_eq!(convergence(&[]), Err(SkipReason::DegenerateAverage));
        assert_eq!(
            convergence(&[dec!(0), dec!(1)]),
            Err(SkipReason::DegenerateAverage)
        );
    }

    #[test]
    fn snapshot_reads_latest_values() {
        let bars = gentle_breakout("2330.TW").cleaned();
        let snapshot = IndicatorSnapshot::compute(&bars, &ScreenConfig::default()).unwrap();
        assert_eq!(snapshot.close, dec!(103));
        assert_eq!(snapshot.average(5), Some(dec!(100.6)));
        assert_eq!(snapshot.average(10), Some(dec!(100.3)));
        assert_eq!(snapshot.average(20), Some(dec!(100.15)));
        assert_eq!(snapshot.previous_long_average, Some(dec!(100)));
        assert_eq!(snapshot.volume_average, dec!(1100000));
    }

    #[test]
    fn labels_follow_priority() {
        let bars = gentle_breakout("2330.TW").cleaned();
        let snapshot = IndicatorSnapshot::compute(&bars, &ScreenConfig::default()).unwrap();
        assert_eq!(
            label(&snapshot, dec!(0.001), dec!(0.001), dec!(3.5)),
            StrategyLabel::VolumeSurge
        );
        assert_eq!(
            label(&snapshot, dec!(0.01), dec!(0.001), dec!(2)),
            StrategyLabel::TightSqueeze
        );
        // Previous close 100 sat on its 20-bar average of 100.
        assert_eq!(
            label(&snapshot, dec!(0.02), dec!(0.02), dec!(2)),
            StrategyLabel::ReclaimedMonthlyAverage
        );
    }

    #[test]
    fn labels_fall_back_without_monthly_reclaim() {
        // Already above the 20-bar average yesterday.
        let series = SeriesBuilder::new("2330.TW")
            .flat(59, dec!(100), dec!(1000000))
            .bar(dec!(101), dec!(1000000))
            .bar(dec!(102), dec!(3000000))
            .build();
        let bars = series.cleaned();
        let snapshot = IndicatorSnapshot::compute(&bars, &ScreenConfig::default()).unwrap();
        assert_eq!(
            label(&snapshot, dec!(0.02), dec!(0.005), dec!(1.8)),
            StrategyLabel::QuietAccumulation
        );
        assert_eq!(
            label(&snapshot, dec!(0.02), dec!(0.02), dec!(1.8)),
            StrategyLabel::SteadyBreakout
        );
    }
}
