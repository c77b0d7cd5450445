//! Fundamental data types shared across the Radar workspace.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Alias for price representation.
pub type Price = Decimal;
/// Alias for share or lot quantities.
pub type Quantity = Decimal;

/// Shares per round lot on the listing market.
pub const ROUND_LOT_SHARES: u64 = 1_000;

/// Converts a raw share volume into whole round lots, truncating partial lots.
#[must_use]
pub fn shares_to_lots(shares: Quantity) -> u64 {
    (shares / Decimal::from(ROUND_LOT_SHARES))
        .trunc()
        .to_u64()
        .unwrap_or(0)
}

/// Converts round lots back into shares.
#[must_use]
pub fn lots_to_shares(lots: u64) -> Quantity {
    Decimal::from(lots) * Decimal::from(ROUND_LOT_SHARES)
}

/// Exchange-qualified ticker identifier such as `2330.TW`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerId(String);

impl TickerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local code without the market suffix (`2330` for `2330.TW`).
    pub fn code(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// The market suffix, if any (`TW` for `2330.TW`).
    pub fn market(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, market)| market)
    }
}

impl fmt::Display for TickerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TickerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TickerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl FromStr for TickerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("ticker identifier cannot be empty".into());
        }
        Ok(Self::new(trimmed))
    }
}

/// Order side used by the paper-trading ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily bar as reported by a data supplier. Any field may be missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Option<Price>,
    pub close: Option<Price>,
    pub volume: Option<Quantity>,
}

impl DailyBar {
    /// Builds a bar with every field present.
    pub fn new(date: NaiveDate, open: Price, close: Price, volume: Quantity) -> Self {
        Self {
            date,
            open: Some(open),
            close: Some(close),
            volume: Some(volume),
        }
    }

    /// Returns the bar with every field present, or `None` when it is malformed.
    ///
    /// A bar is malformed when a field is missing, the close is not positive or the
    /// volume is negative.
    pub fn clean(&self) -> Option<CleanBar> {
        let open = self.open?;
        let close = self.close?;
        let volume = self.volume?;
        if close <= Decimal::ZERO || volume < Decimal::ZERO {
            return None;
        }
        Some(CleanBar {
            date: self.date,
            open,
            close,
            volume,
        })
    }
}

/// A daily bar with every field validated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CleanBar {
    pub date: NaiveDate,
    pub open: Price,
    pub close: Price,
    pub volume: Quantity,
}

/// Chronologically ordered daily bars for one ticker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: TickerId,
    bars: Vec<DailyBar>,
}

impl PriceSeries {
    /// Builds a series, sorting by date and keeping the last bar seen for a repeated date.
    pub fn new(ticker: TickerId, mut bars: Vec<DailyBar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        let mut deduped: Vec<DailyBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            ticker,
            bars: deduped,
        }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }

    /// Drops malformed bars, preserving order.
    pub fn cleaned(&self) -> Vec<CleanBar> {
        self.bars.iter().filter_map(DailyBar::clean).collect()
    }

    /// Keeps only bars within `days` calendar days of the newest bar.
    #[must_use]
    pub fn within_lookback(mut self, days: u32) -> Self {
        if let Some(latest) = self.latest_date() {
            let cutoff = latest - chrono::Duration::days(i64::from(days));
            self.bars.retain(|bar| bar.date > cutoff);
        }
        self
    }
}

/// Human-readable classification of why a candidate qualified.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyLabel {
    /// Volume more than three times its average.
    VolumeSurge,
    /// Short averages bunched within 1.5%.
    TightSqueeze,
    /// Close reclaimed the 20-day average today.
    ReclaimedMonthlyAverage,
    /// Elevated volume with price hugging the 5-day average.
    QuietAccumulation,
    /// Qualified without a more specific pattern.
    SteadyBreakout,
}

impl StrategyLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyLabel::VolumeSurge => "volume_surge",
            StrategyLabel::TightSqueeze => "tight_squeeze",
            StrategyLabel::ReclaimedMonthlyAverage => "reclaimed_monthly_average",
            StrategyLabel::QuietAccumulation => "quiet_accumulation",
            StrategyLabel::SteadyBreakout => "steady_breakout",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StrategyLabel::VolumeSurge => "heavy-volume breakout, strongest short-term momentum",
            StrategyLabel::TightSqueeze => "extreme squeeze, consolidation resolving upward",
            StrategyLabel::ReclaimedMonthlyAverage => "turning up, closed back above the 20-day average",
            StrategyLabel::QuietAccumulation => "early move on volume with very low extension",
            StrategyLabel::SteadyBreakout => "steady breakout consistent with price and volume",
        }
    }
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of screener output. A point-in-time snapshot; re-quote before ordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub ticker: TickerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    pub as_of: NaiveDate,
    pub price: Price,
    /// Latest volume in round lots.
    pub volume_lots: u64,
    pub stop_loss: Price,
    pub take_profit: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyLabel>,
    pub convergence: Decimal,
    pub bias: Decimal,
    pub volume_ratio: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn ticker_splits_code_and_market() {
        let ticker = TickerId::from("2330.TW");
        assert_eq!(ticker.code(), "2330");
        assert_eq!(ticker.market(), Some("TW"));
        assert_eq!(TickerId::from("AAPL").market(), None);
    }

    #[test]
    fn lots_truncate_partial_lots() {
        assert_eq!(shares_to_lots(dec!(1999999)), 1_999);
        assert_eq!(shares_to_lots(dec!(999)), 0);
        assert_eq!(lots_to_shares(3), dec!(3000));
    }

    #[test]
    fn series_sorts_and_keeps_last_duplicate() {
        let series = PriceSeries::new(
            TickerId::from("1101.TW"),
            vec![
                DailyBar::new(day(3), dec!(1), dec!(3), dec!(10)),
                DailyBar::new(day(1), dec!(1), dec!(1), dec!(10)),
                DailyBar::new(day(3), dec!(1), dec!(4), dec!(10)),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].date, day(1));
        assert_eq!(series.bars()[1].close, Some(dec!(4)));
    }

    #[test]
    fn cleaning_drops_malformed_bars() {
        let mut gap = DailyBar::new(day(2), dec!(1), dec!(1), dec!(5));
        gap.volume = None;
        let zero_close = DailyBar::new(day(3), dec!(1), dec!(0), dec!(5));
        let series = PriceSeries::new(
            TickerId::from("1101.TW"),
            vec![DailyBar::new(day(1), dec!(1), dec!(1), dec!(5)), gap, zero_close],
        );
        let cleaned = series.cleaned();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].date, day(1));
    }

    #[test]
    fn lookback_trims_old_bars() {
        let series = PriceSeries::new(
            TickerId::from("1101.TW"),
            (1..=10)
                .map(|d| DailyBar::new(day(d), dec!(1), dec!(1), dec!(1)))
                .collect(),
        )
        .within_lookback(3);
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[0].date, day(8));
    }

    #[test]
    fn candidate_serializes_snake_case_label() {
        let candidate = CandidateResult {
            ticker: TickerId::from("2330.TW"),
            industry: None,
            as_of: day(1),
            price: dec!(110),
            volume_lots: 3000,
            stop_loss: dec!(100),
            take_profit: dec!(126.5),
            strategy: Some(StrategyLabel::VolumeSurge),
            convergence: dec!(0.01),
            bias: dec!(0.02),
            volume_ratio: dec!(3.1),
        };
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["strategy"], "volume_surge");
        assert!(json.get("industry").is_none());
    }
}
