use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Raised synchronously when a screen configuration cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one moving-average window is required")]
    NoWindows,
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: Decimal },
    #[error("stop_loss_buffer must be below 1 (got {0})")]
    BufferTooLarge(Decimal),
    #[error("{field} of {value} exceeds the maximum of {max}")]
    TooLarge {
        field: &'static str,
        value: usize,
        max: usize,
    },
}

/// Largest accepted averaging window, roughly forty years of daily bars.
pub const MAX_WINDOW: usize = 10_000;

/// Order in which qualifying candidates are returned before `result_cap` applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Highest latest volume first, ties broken by ticker.
    #[default]
    VolumeDescending,
    /// Universe order.
    Unordered,
    /// A uniform sample; deterministic when `seed` is set.
    RandomSample {
        #[serde(default)]
        seed: Option<u64>,
    },
}

/// Reference level used to derive the stop-loss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossPolicy {
    /// Lowest of the short-window averages.
    #[default]
    ClusterMin,
    /// The long-window average.
    LongAverage,
}

/// Immutable settings for one breakout screening run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Moving-average periods. The longest is the long window; the rest form the short set.
    pub windows: Vec<usize>,
    pub convergence_threshold: Decimal,
    pub bias_threshold: Decimal,
    pub bias_window: usize,
    pub volume_multiplier: Decimal,
    pub volume_window: usize,
    /// Minimum latest volume, in shares.
    pub min_volume_floor: Decimal,
    pub take_profit_pct: Decimal,
    pub stop_loss_buffer: Decimal,
    pub stop_loss_policy: StopLossPolicy,
    pub result_cap: Option<usize>,
    pub ranking: RankingPolicy,
    pub batch_size: usize,
    pub use_trend_rising_gate: bool,
    pub use_weekly_trend_gate: bool,
    /// Weeks averaged by the weekly trend gate.
    pub weekly_window: usize,
    /// Calendar days requested on top of the computed lookback to absorb market holidays.
    pub lookback_padding_days: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            windows: vec![5, 10, 20, 60],
            convergence_threshold: Decimal::new(3, 2),
            bias_threshold: Decimal::new(35, 3),
            bias_window: 5,
            volume_multiplier: Decimal::new(15, 1),
            volume_window: 20,
            min_volume_floor: Decimal::from(1_000_000),
            take_profit_pct: Decimal::new(15, 2),
            stop_loss_buffer: Decimal::ZERO,
            stop_loss_policy: StopLossPolicy::ClusterMin,
            result_cap: None,
            ranking: RankingPolicy::VolumeDescending,
            batch_size: 50,
            use_trend_rising_gate: false,
            use_weekly_trend_gate: false,
            weekly_window: 20,
            lookback_padding_days: 30,
        }
    }
}

impl ScreenConfig {
    /// Rejects configurations that indicate programmer error.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.windows.is_empty() {
            return Err(ConfigError::NoWindows);
        }
        if self.windows.contains(&0) {
            return Err(ConfigError::ZeroValue { field: "windows" });
        }
        for (field, value) in [
            ("bias_window", self.bias_window),
            ("volume_window", self.volume_window),
            ("batch_size", self.batch_size),
            ("weekly_window", self.weekly_window),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue { field });
            }
        }
        let longest = self.windows.iter().copied().max().unwrap_or(0);
        for (field, value) in [
            ("windows", longest),
            ("bias_window", self.bias_window),
            ("volume_window", self.volume_window),
            ("weekly_window", self.weekly_window),
        ] {
            if value > MAX_WINDOW {
                return Err(ConfigError::TooLarge {
                    field,
                    value,
                    max: MAX_WINDOW,
                });
            }
        }
        if self.result_cap == Some(0) {
            return Err(ConfigError::ZeroValue {
                field: "result_cap",
            });
        }
        for (field, value) in [
            ("convergence_threshold", self.convergence_threshold),
            ("bias_threshold", self.bias_threshold),
            ("volume_multiplier", self.volume_multiplier),
            ("min_volume_floor", self.min_volume_floor),
            ("take_profit_pct", self.take_profit_pct),
            ("stop_loss_buffer", self.stop_loss_buffer),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if self.stop_loss_buffer >= Decimal::ONE {
            return Err(ConfigError::BufferTooLarge(self.stop_loss_buffer));
        }
        Ok(())
    }

    /// The longest configured window.
    pub fn long_window(&self) -> usize {
        self.windows.iter().copied().max().unwrap_or(0)
    }

    /// Windows whose averages are tested for convergence.
    ///
    /// Every window except the longest; a single configured window forms its own set.
    pub fn short_windows(&self) -> Vec<usize> {
        let long = self.long_window();
        let mut short: Vec<usize> = self.windows.iter().copied().filter(|w| *w != long).collect();
        if short.is_empty() {
            short.push(long);
        }
        short.sort_unstable();
        short.dedup();
        short
    }

    /// Number of clean bars needed before a ticker can be evaluated.
    pub fn required_history(&self) -> usize {
        let base = self
            .long_window()
            .max(self.bias_window)
            .max(self.volume_window);
        if self.use_trend_rising_gate {
            base.saturating_add(1)
        } else {
            base
        }
    }

    /// Calendar days of history to request from the data supplier.
    ///
    /// Daily history gets one and a half calendar days per bar, which covers weekends and
    /// leaves room for a multi-day holiday closure; the padding is added on top.
    pub fn lookback_days(&self) -> u32 {
        let bars = u32::try_from(self.required_history()).unwrap_or(u32::MAX);
        let daily = bars.saturating_mul(3).div_ceil(2);
        let weekly = if self.use_weekly_trend_gate {
            u32::try_from(self.weekly_window)
                .unwrap_or(u32::MAX)
                .saturating_mul(7)
        } else {
            0
        };
        daily.max(weekly).saturating_add(self.lookback_padding_days)
    }
}
