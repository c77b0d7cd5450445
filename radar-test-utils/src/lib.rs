//! Fixtures shared by the Radar test suites: weekday-dated synthetic series and
//! suppliers whose failures can be scripted per batch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use radar_core::{DailyBar, PriceSeries, TickerId};
use radar_data::{FetchResponse, HistoricalDataSupplier, InMemorySupplier, SupplierError};
use rust_decimal::Decimal;

/// Base volume used by the canned series, in shares.
pub const BASE_VOLUME: i64 = 1_000_000;

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// Weekday exchange closures from October 2023 through March 2024.
pub fn twse_closures_2024() -> Vec<NaiveDate> {
    vec![
        ymd(2023, 10, 9),
        ymd(2023, 10, 10),
        ymd(2024, 1, 1),
        ymd(2024, 2, 6),
        ymd(2024, 2, 7),
        ymd(2024, 2, 8),
        ymd(2024, 2, 9),
        ymd(2024, 2, 12),
        ymd(2024, 2, 13),
        ymd(2024, 2, 14),
        ymd(2024, 2, 28),
    ]
}

/// Builds a series on consecutive trading days, 2024-01-01 onwards unless told otherwise.
pub struct SeriesBuilder {
    ticker: TickerId,
    next_date: NaiveDate,
    closed: HashSet<NaiveDate>,
    bars: Vec<DailyBar>,
}

impl SeriesBuilder {
    pub fn new(ticker: impl Into<TickerId>) -> Self {
        Self::starting(ticker, ymd(2024, 1, 1))
    }

    /// Starts the series on `date`, which must be a weekday.
    pub fn starting(ticker: impl Into<TickerId>, date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            next_date: date,
            closed: HashSet::new(),
            bars: Vec::new(),
        }
    }

    /// Skips `dates` as exchange holidays.
    pub fn closed_on(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.closed.extend(dates);
        while self.closed.contains(&self.next_date) {
            self.next_date = self.following(self.next_date);
        }
        self
    }

    fn following(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date + ChronoDuration::days(1);
        while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) || self.closed.contains(&next)
        {
            next += ChronoDuration::days(1);
        }
        next
    }

    fn advance(&mut self) -> NaiveDate {
        let date = self.next_date;
        self.next_date = self.following(date);
        date
    }

    /// Appends one complete bar.
    pub fn bar(mut self, close: Decimal, volume: Decimal) -> Self {
        let date = self.advance();
        self.bars.push(DailyBar::new(date, close, close, volume));
        self
    }

    /// Appends `count` identical bars.
    pub fn flat(mut self, count: usize, close: Decimal, volume: Decimal) -> Self {
        for _ in 0..count {
            self = self.bar(close, volume);
        }
        self
    }

    /// Appends identical bars on every trading day before `date`.
    pub fn flat_until(mut self, date: NaiveDate, close: Decimal, volume: Decimal) -> Self {
        while self.next_date < date {
            self = self.bar(close, volume);
        }
        self
    }

    /// Appends a bar whose volume is missing.
    pub fn gap(mut self, close: Decimal) -> Self {
        let date = self.advance();
        self.bars.push(DailyBar {
            date,
            open: Some(close),
            close: Some(close),
            volume: None,
        });
        self
    }

    pub fn build(self) -> PriceSeries {
        PriceSeries::new(self.ticker, self.bars)
    }
}

fn base_volume() -> Decimal {
    Decimal::from(BASE_VOLUME)
}

/// Sixty flat bars at 100 followed by a close of 103 on three times the usual volume.
///
/// Passes every predicate of the default configuration.
pub fn gentle_breakout(ticker: &str) -> PriceSeries {
    gentle_breakout_with_volume(ticker, base_volume())
}

/// [`gentle_breakout`] scaled to a different base volume.
pub fn gentle_breakout_with_volume(ticker: &str, volume: Decimal) -> PriceSeries {
    SeriesBuilder::new(ticker)
        .flat(60, Decimal::from(100), volume)
        .bar(Decimal::from(103), volume * Decimal::from(3))
        .build()
}

/// Sixty flat bars at 100 followed by a 10% jump to 110 on three times the volume.
pub fn ten_percent_jump(ticker: &str) -> PriceSeries {
    SeriesBuilder::new(ticker)
        .flat(60, Decimal::from(100), base_volume())
        .bar(Decimal::from(110), base_volume() * Decimal::from(3))
        .build()
}

/// [`gentle_breakout`] on the 2024 exchange calendar, breaking out on 2024-03-29 after
/// the Lunar New Year closure.
pub fn holiday_breakout(ticker: &str) -> PriceSeries {
    SeriesBuilder::starting(ticker, ymd(2023, 10, 2))
        .closed_on(twse_closures_2024())
        .flat_until(ymd(2024, 3, 29), Decimal::from(100), base_volume())
        .bar(Decimal::from(103), base_volume() * Decimal::from(3))
        .build()
}

/// A favourable breakout that only has `bars` bars of history.
pub fn short_history(ticker: &str, bars: usize) -> PriceSeries {
    SeriesBuilder::new(ticker)
        .flat(bars.saturating_sub(1), Decimal::from(100), base_volume())
        .bar(Decimal::from(103), base_volume() * Decimal::from(3))
        .build()
}

/// A breakout whose volume never exceeds 500,000 shares.
pub fn illiquid_breakout(ticker: &str) -> PriceSeries {
    SeriesBuilder::new(ticker)
        .flat(60, Decimal::from(100), Decimal::from(160_000))
        .bar(Decimal::from(103), Decimal::from(500_000))
        .build()
}

/// A supplier backed by memory whose batches can be made to fail or stall.
pub struct ScriptedSupplier {
    inner: InMemorySupplier,
    poisoned: HashSet<TickerId>,
    stalled: HashSet<TickerId>,
    delay: Duration,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl ScriptedSupplier {
    pub fn new(series: impl IntoIterator<Item = PriceSeries>) -> Self {
        Self {
            inner: series.into_iter().collect(),
            poisoned: HashSet::new(),
            stalled: HashSet::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Any batch containing `ticker` fails as a whole.
    pub fn fail_batches_with(mut self, ticker: &str) -> Self {
        self.poisoned.insert(TickerId::from(ticker));
        self
    }

    /// Any batch containing `ticker` sleeps far beyond any reasonable timeout.
    pub fn stall_batches_with(mut self, ticker: &str) -> Self {
        self.stalled.insert(TickerId::from(ticker));
        self
    }

    /// Every fetch sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of batch fetches issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of batch fetches that ran to the end instead of being dropped.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoricalDataSupplier for ScriptedSupplier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(
        &self,
        tickers: &[TickerId],
        lookback_days: u32,
    ) -> Result<FetchResponse, SupplierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if tickers.iter().any(|ticker| self.stalled.contains(ticker)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if tickers.iter().any(|ticker| self.poisoned.contains(ticker)) {
            return Err(SupplierError::Unavailable("scripted outage".into()));
        }
        self.inner.fetch(tickers, lookback_days).await
    }
}
