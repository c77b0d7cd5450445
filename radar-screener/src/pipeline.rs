use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use radar_config::{FetchSettings, ScreenConfig};
use radar_core::{CandidateResult, TickerId};
use radar_data::{FetchError, FetchResponse, HistoricalDataSupplier, RateLimiter, UniverseSource};
use rayon::prelude::*;
use tokio::sync::watch;
use tokio::task;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::evaluate;
use crate::outcome::{BatchFailure, ScanOutcome};
use crate::progress::ScanProgress;
use crate::ranking::rank;
use crate::skip::{Exclusion, ScanError, ScanResult, SkipReason};

type Verdict = (TickerId, Result<CandidateResult, SkipReason>);

enum BatchOutcome {
    Evaluated { index: usize, verdicts: Vec<Verdict> },
    Failed(BatchFailure),
    Skipped { index: usize },
}

impl BatchOutcome {
    fn index(&self) -> usize {
        match self {
            BatchOutcome::Evaluated { index, .. } | BatchOutcome::Skipped { index } => *index,
            BatchOutcome::Failed(failure) => failure.index,
        }
    }
}

/// Runs breakout scans over a universe, fetching history in bounded concurrent batches.
///
/// A failed or timed-out batch is recorded and skipped; the rest of the scan continues.
/// Cancelling the token stops new batches from starting, waits for batches already
/// fetching, and discards partial results.
pub struct Screener {
    supplier: Arc<dyn HistoricalDataSupplier>,
    limiter: RateLimiter,
    max_concurrent_batches: usize,
    fetch_timeout: Duration,
    industries: Option<Arc<dyn UniverseSource>>,
    progress: watch::Sender<ScanProgress>,
    cancel: CancellationToken,
}

impl Screener {
    pub fn new(supplier: Arc<dyn HistoricalDataSupplier>) -> Self {
        let defaults = FetchSettings::default();
        let (progress, _) = watch::channel(ScanProgress::default());
        Self {
            supplier,
            limiter: RateLimiter::unlimited(),
            max_concurrent_batches: defaults.max_concurrent_batches,
            fetch_timeout: Duration::from_secs(defaults.timeout_secs),
            industries: None,
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Applies concurrency, timeout and rate settings.
    #[must_use]
    pub fn with_fetch_settings(self, settings: &FetchSettings) -> Self {
        self.with_concurrency(settings.max_concurrent_batches)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_limiter(RateLimiter::per_second(settings.requests_per_second))
    }

    #[must_use]
    pub fn with_concurrency(mut self, batches: usize) -> Self {
        self.max_concurrent_batches = batches.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Source used to tag candidates with an industry.
    #[must_use]
    pub fn with_industries(mut self, source: Arc<dyn UniverseSource>) -> Self {
        self.industries = Some(source);
        self
    }

    /// Subscribes to progress updates for subsequent scans.
    pub fn progress(&self) -> watch::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    /// Token that cancels any scan run by this screener. Once cancelled it stays cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Lists `source` and scans it, tagging candidates with the source's industries.
    pub async fn scan_universe(
        &self,
        source: &dyn UniverseSource,
        config: &ScreenConfig,
    ) -> ScanResult<ScanOutcome> {
        config.validate()?;
        let universe = source.list_universe().await?;
        self.run(&universe, config, Some(source)).await
    }

    /// Scans an explicit ticker list.
    pub async fn scan(&self, universe: &[TickerId], config: &ScreenConfig) -> ScanResult<ScanOutcome> {
        self.run(universe, config, self.industries.as_deref()).await
    }

    async fn run(
        &self,
        universe: &[TickerId],
        config: &ScreenConfig,
        industries: Option<&dyn UniverseSource>,
    ) -> ScanResult<ScanOutcome> {
        config.validate()?;
        let started_at = Utc::now();
        if universe.is_empty() {
            info!("universe is empty, nothing to scan");
            self.progress.send_replace(ScanProgress {
                finished: true,
                ..ScanProgress::default()
            });
            return Ok(ScanOutcome::empty(started_at));
        }

        let lookback = config.lookback_days();
        let batches: Vec<Vec<TickerId>> = universe
            .chunks(config.batch_size)
            .map(<[TickerId]>::to_vec)
            .collect();
        let total = batches.len();
        info!(
            supplier = self.supplier.name(),
            tickers = universe.len(),
            batches = total,
            lookback_days = lookback,
            "starting scan"
        );
        self.progress.send_replace(ScanProgress::started(total));

        let shared = Arc::new(config.clone());
        let mut outcomes: Vec<BatchOutcome> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, tickers)| self.run_batch(index, tickers, lookback, Arc::clone(&shared)))
            .buffer_unordered(self.max_concurrent_batches)
            .inspect(|outcome| self.record_progress(outcome))
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            let completed = outcomes
                .iter()
                .filter(|outcome| !matches!(outcome, BatchOutcome::Skipped { .. }))
                .count();
            self.progress.send_modify(|progress| progress.finished = true);
            warn!(completed, total, "scan cancelled, discarding partial results");
            return Err(ScanError::Cancelled { completed, total });
        }

        outcomes.sort_by_key(BatchOutcome::index);
        let mut candidates = Vec::new();
        let mut exclusions = Vec::new();
        let mut failed_batches = Vec::new();
        let mut evaluated = 0;
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Evaluated { verdicts, .. } => {
                    for (ticker, verdict) in verdicts {
                        if !matches!(verdict, Err(SkipReason::NotFetched(_))) {
                            evaluated += 1;
                        }
                        match verdict {
                            Ok(mut candidate) => {
                                candidate.industry =
                                    industries.and_then(|source| source.industry_of(&ticker));
                                candidates.push(candidate);
                            }
                            Err(reason) => {
                                debug!(ticker = %ticker, reason = %reason, "ticker excluded");
                                exclusions.push(Exclusion::new(ticker, reason));
                            }
                        }
                    }
                }
                BatchOutcome::Failed(failure) => failed_batches.push(failure),
                BatchOutcome::Skipped { .. } => {}
            }
        }

        let qualified = candidates.len();
        let candidates = rank(config.ranking, config.result_cap, candidates);
        self.progress.send_modify(|progress| progress.finished = true);
        info!(
            qualified,
            returned = candidates.len(),
            excluded = exclusions.len(),
            failed_batches = failed_batches.len(),
            "scan complete"
        );
        Ok(ScanOutcome {
            candidates,
            exclusions,
            failed_batches,
            universe_size: universe.len(),
            evaluated,
            started_at,
            completed_at: Utc::now(),
        })
    }

    async fn run_batch(
        &self,
        index: usize,
        tickers: Vec<TickerId>,
        lookback_days: u32,
        config: Arc<ScreenConfig>,
    ) -> BatchOutcome {
        if self.cancel.is_cancelled() {
            return BatchOutcome::Skipped { index };
        }
        tokio::select! {
            _ = self.cancel.cancelled() => return BatchOutcome::Skipped { index },
            _ = self.limiter.until_ready() => {}
        }

        // Once started, a fetch runs to completion or timeout even if the scan is cancelled.
        let fetched = timeout(self.fetch_timeout, self.supplier.fetch(&tickers, lookback_days)).await;
        let response = match fetched {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(batch = index, tickers = tickers.len(), error = %err, "batch fetch failed");
                return BatchOutcome::Failed(BatchFailure {
                    index,
                    tickers,
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                warn!(batch = index, timeout = ?self.fetch_timeout, "batch fetch timed out");
                return BatchOutcome::Failed(BatchFailure {
                    index,
                    tickers,
                    reason: format!("timed out after {:?}", self.fetch_timeout),
                });
            }
        };

        let batch = tickers.clone();
        match task::spawn_blocking(move || evaluate_batch(batch, &response, &config)).await {
            Ok(verdicts) => BatchOutcome::Evaluated { index, verdicts },
            Err(err) => {
                warn!(batch = index, error = %err, "batch evaluation panicked");
                BatchOutcome::Failed(BatchFailure {
                    index,
                    tickers,
                    reason: format!("evaluation failed: {err}"),
                })
            }
        }
    }

    fn record_progress(&self, outcome: &BatchOutcome) {
        self.progress.send_modify(|progress| match outcome {
            BatchOutcome::Evaluated { verdicts, .. } => {
                progress.completed_batches += 1;
                progress.candidates_found += verdicts.iter().filter(|(_, v)| v.is_ok()).count();
            }
            BatchOutcome::Failed(_) => {
                progress.completed_batches += 1;
                progress.failed_batches += 1;
            }
            BatchOutcome::Skipped { .. } => {}
        });
        let snapshot = *self.progress.borrow();
        debug!(
            completed = snapshot.completed_batches,
            total = snapshot.total_batches,
            "batch finished"
        );
    }
}

/// Evaluates one fetched batch in parallel, preserving ticker order.
fn evaluate_batch(tickers: Vec<TickerId>, response: &FetchResponse, config: &ScreenConfig) -> Vec<Verdict> {
    tickers
        .into_par_iter()
        .map(|ticker| {
            let verdict = match response.get(&ticker) {
                Some(Ok(series)) => evaluate(series, config),
                Some(Err(err)) => Err(SkipReason::NotFetched(err.clone())),
                None => Err(SkipReason::NotFetched(FetchError::NotFound)),
            };
            (ticker, verdict)
        })
        .collect()
}
