//! Layered configuration for the Radar screener.
//!
//! Settings are read from `<dir>/default.toml`, then `<dir>/<env>.toml`, then
//! environment variables such as `RADAR__SCREEN__BATCH_SIZE=100`. Every section
//! has defaults, so missing files are not an error.

mod screen;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use screen::{
    ConfigError, ConfigResult, RankingPolicy, ScreenConfig, StopLossPolicy, MAX_WINDOW,
};

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub screen: ScreenConfig,
    pub fetch: FetchSettings,
    pub universe: UniverseSettings,
    pub paper: PaperSettings,
    pub access: AccessSettings,
    pub logging: LoggingSettings,
}

/// Limits applied to historical data requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Batches fetched at the same time.
    pub max_concurrent_batches: usize,
    /// Upper bound for a single batch fetch.
    pub timeout_secs: u64,
    /// Requests released per second, both per batch and per ticker request.
    pub requests_per_second: u32,
    /// Ticker requests one batch may keep open at once.
    pub max_requests_in_flight: usize,
    pub yahoo_base_url: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 4,
            timeout_secs: 60,
            requests_per_second: 10,
            max_requests_in_flight: 8,
            yahoo_base_url: "https://query1.finance.yahoo.com".into(),
        }
    }
}

/// Inclusive numeric ticker code range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRange {
    pub start: u32,
    pub end: u32,
}

impl CodeRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Describes the scan universe when it is generated from code ranges.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseSettings {
    pub ranges: Vec<CodeRange>,
    /// Market suffix appended to each code, including the dot.
    pub suffix: String,
    pub cache_ttl_secs: u64,
}

impl Default for UniverseSettings {
    fn default() -> Self {
        Self {
            ranges: vec![
                CodeRange::new(1501, 1599),
                CodeRange::new(2301, 2498),
                CodeRange::new(2601, 2639),
                CodeRange::new(6101, 6298),
            ],
            suffix: ".TW".into(),
            cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Paper-trading account settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub starting_cash: Decimal,
    pub store_path: PathBuf,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            starting_cash: Decimal::from(1_000_000),
            store_path: PathBuf::from("data/accounts.db"),
        }
    }
}

/// Static allow-list of access codes. An empty list disables the check.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSettings {
    pub codes: Vec<String>,
}

impl AccessSettings {
    pub fn is_enabled(&self) -> bool {
        !self.codes.is_empty()
    }

    pub fn permits(&self, code: Option<&str>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        code.map(str::trim)
            .is_some_and(|code| self.codes.iter().any(|allowed| allowed == code))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
    /// Optional log file written alongside stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            file: None,
        }
    }
}

/// Loads configuration from `dir` for the named environment and validates the screen section.
pub fn load_config(dir: impl AsRef<Path>, env: Option<&str>) -> Result<AppConfig> {
    let dir = dir.as_ref();
    let mut builder =
        Config::builder().add_source(File::from(dir.join("default.toml")).required(false));
    if let Some(env) = env.filter(|name| *name != "default") {
        builder = builder.add_source(File::from(dir.join(format!("{env}.toml"))).required(false));
    }
    let settings = builder
        .add_source(
            Environment::with_prefix("RADAR")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from {}", dir.display()))?;
    let app: AppConfig = settings
        .try_deserialize()
        .context("configuration has an invalid shape")?;
    app.screen
        .validate()
        .context("screen configuration is invalid")?;
    Ok(app)
}
