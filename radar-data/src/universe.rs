use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use radar_config::{CodeRange, UniverseSettings};
use radar_core::TickerId;
use tokio::sync::RwLock;
use tracing::debug;

use crate::supplier::SupplierError;

/// Supplies the tickers eligible for a scan and, optionally, their industry.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn list_universe(&self) -> Result<Vec<TickerId>, SupplierError>;

    fn industry_of(&self, _ticker: &TickerId) -> Option<String> {
        None
    }
}

/// Maps a ticker to an industry or category label.
pub trait IndustryClassifier: Send + Sync {
    fn classify(&self, ticker: &TickerId) -> Option<String>;
}

/// Coarse industry groups keyed by the numeric listing code.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodeRangeClassifier;

impl IndustryClassifier for CodeRangeClassifier {
    fn classify(&self, ticker: &TickerId) -> Option<String> {
        let label = match ticker.code().parse::<u32>() {
            Ok(2330) => "Semiconductor Foundry",
            Ok(2301..=2499) => "Electronics/Semiconductor",
            Ok(1501..=1599) => "Electrical Machinery",
            Ok(_) => "Other/Traditional",
            Err(_) => "Unknown",
        };
        Some(label.to_string())
    }
}

/// A fixed, caller-supplied ticker list.
#[derive(Clone)]
pub struct StaticUniverse {
    tickers: Vec<TickerId>,
    classifier: Option<Arc<dyn IndustryClassifier>>,
}

impl StaticUniverse {
    pub fn new(tickers: Vec<TickerId>) -> Self {
        Self {
            tickers,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IndustryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }
}

#[async_trait]
impl UniverseSource for StaticUniverse {
    async fn list_universe(&self) -> Result<Vec<TickerId>, SupplierError> {
        Ok(self.tickers.clone())
    }

    fn industry_of(&self, ticker: &TickerId) -> Option<String> {
        self.classifier
            .as_ref()
            .and_then(|classifier| classifier.classify(ticker))
    }
}

/// Generates tickers from inclusive numeric code ranges plus a market suffix.
#[derive(Clone, Debug)]
pub struct CodeRangeUniverse {
    ranges: Vec<CodeRange>,
    suffix: String,
}

impl CodeRangeUniverse {
    pub fn new(ranges: Vec<CodeRange>, suffix: impl Into<String>) -> Self {
        Self {
            ranges,
            suffix: suffix.into(),
        }
    }

    pub fn from_settings(settings: &UniverseSettings) -> Self {
        Self::new(settings.ranges.clone(), settings.suffix.clone())
    }

    pub fn tickers(&self) -> Vec<TickerId> {
        self.ranges
            .iter()
            .flat_map(|range| range.start..=range.end)
            .map(|code| TickerId::new(format!("{code}{}", self.suffix)))
            .collect()
    }
}

#[async_trait]
impl UniverseSource for CodeRangeUniverse {
    async fn list_universe(&self) -> Result<Vec<TickerId>, SupplierError> {
        Ok(self.tickers())
    }

    fn industry_of(&self, ticker: &TickerId) -> Option<String> {
        CodeRangeClassifier.classify(ticker)
    }
}

/// Caches another source's listing for a fixed time-to-live.
pub struct CachedUniverse<S> {
    inner: S,
    ttl: Duration,
    cached: RwLock<Option<(Instant, Vec<TickerId>)>>,
}

impl<S: UniverseSource> CachedUniverse<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Drops the cached listing so the next call refreshes it.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[async_trait]
impl<S: UniverseSource> UniverseSource for CachedUniverse<S> {
    async fn list_universe(&self) -> Result<Vec<TickerId>, SupplierError> {
        if let Some((fetched_at, tickers)) = self.cached.read().await.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(tickers.clone());
            }
        }
        let tickers = self.inner.list_universe().await?;
        debug!(count = tickers.len(), "refreshed universe listing");
        *self.cached.write().await = Some((Instant::now(), tickers.clone()));
        Ok(tickers)
    }

    fn industry_of(&self, ticker: &TickerId) -> Option<String> {
        self.inner.industry_of(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn classifier_matches_code_ranges() {
        let classify = |t: &str| CodeRangeClassifier.classify(&TickerId::from(t)).unwrap();
        assert_eq!(classify("2330.TW"), "Semiconductor Foundry");
        assert_eq!(classify("2303.TW"), "Electronics/Semiconductor");
        assert_eq!(classify("1504.TW"), "Electrical Machinery");
        assert_eq!(classify("2603.TW"), "Other/Traditional");
        assert_eq!(classify("ABC.TW"), "Unknown");
    }

    #[tokio::test]
    async fn default_ranges_expand_with_suffix() {
        let universe = CodeRangeUniverse::from_settings(&UniverseSettings::default());
        let tickers = universe.list_universe().await.unwrap();
        assert_eq!(tickers.len(), 99 + 198 + 39 + 198);
        assert_eq!(tickers[0], TickerId::from("1501.TW"));
        assert_eq!(tickers.last().unwrap(), &TickerId::from("6298.TW"));
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UniverseSource for Counting {
        async fn list_universe(&self) -> Result<Vec<TickerId>, SupplierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![TickerId::from("1101.TW")])
        }
    }

    #[tokio::test]
    async fn cache_serves_until_invalidated() {
        let cached = CachedUniverse::new(
            Counting {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(3600),
        );
        cached.list_universe().await.unwrap();
        cached.list_universe().await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        cached.invalidate().await;
        cached.list_universe().await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
