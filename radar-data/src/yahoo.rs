use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use radar_core::{DailyBar, PriceSeries, TickerId};
use reqwest::{header, Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::limiter::RateLimiter;
use crate::supplier::{FetchError, FetchResponse, HistoricalDataSupplier, SupplierError};

const USER_AGENT: &str = concat!("radar/", env!("CARGO_PKG_VERSION"));
const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Daily bars from the public Yahoo Finance chart endpoint, one request per ticker.
///
/// Requests within a batch share a cap on concurrent connections, and each one waits on
/// the rate limiter before it is sent.
pub struct YahooChartSupplier {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
    max_in_flight: usize,
}

impl YahooChartSupplier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            limiter: RateLimiter::unlimited(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Paces individual ticker requests.
    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Caps the requests a single batch keeps open at once.
    #[must_use]
    pub fn with_max_in_flight(mut self, requests: usize) -> Self {
        self.max_in_flight = requests.max(1);
        self
    }

    fn endpoint(&self, ticker: &TickerId) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/v8/finance/chart/{}", ticker.as_str())
    }

    async fn fetch_one(
        &self,
        ticker: &TickerId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, FetchError> {
        self.limiter.until_ready().await;
        let response = self
            .client
            .get(self.endpoint(ticker))
            .header(header::USER_AGENT, USER_AGENT)
            .query(&[
                ("interval", "1d"),
                ("period1", &start.timestamp().to_string()),
                ("period2", &end.timestamp().to_string()),
            ])
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound),
            status if !status.is_success() => {
                return Err(FetchError::Transport(format!("unexpected status {status}")))
            }
            _ => {}
        }
        let body = response
            .text()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        parse_chart(ticker.clone(), &body)
    }
}

#[async_trait]
impl HistoricalDataSupplier for YahooChartSupplier {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch(
        &self,
        tickers: &[TickerId],
        lookback_days: u32,
    ) -> Result<FetchResponse, SupplierError> {
        if tickers.is_empty() {
            return Ok(FetchResponse::new());
        }
        let end = Utc::now();
        let start = end - Duration::days(i64::from(lookback_days));
        let results: Vec<(TickerId, Result<PriceSeries, FetchError>)> = stream::iter(tickers.iter().cloned())
            .map(|ticker: TickerId| async move {
                let result = self.fetch_one(&ticker, start, end).await;
                (ticker, result)
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let transport_failures = results
            .iter()
            .filter(|(_, result)| matches!(result, Err(FetchError::Transport(_))))
            .count();
        if transport_failures == results.len() {
            if let Some((_, Err(err))) = results.first() {
                warn!(error = %err, tickers = tickers.len(), "every request in batch failed");
                return Err(SupplierError::Unavailable(err.to_string()));
            }
        }
        for (ticker, result) in &results {
            if let Err(err) = result {
                debug!(ticker = %ticker, error = %err, "yahoo series unavailable");
            }
        }
        Ok(results.into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Converts a chart endpoint response into a series. Null cells become missing fields.
pub fn parse_chart(ticker: TickerId, body: &str) -> Result<PriceSeries, FetchError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|err| FetchError::Malformed(err.to_string()))?;
    if let Some(error) = envelope.chart.error {
        if error.code == "Not Found" {
            return Err(FetchError::NotFound);
        }
        return Err(FetchError::Malformed(
            error.description.unwrap_or(error.code),
        ));
    }
    let result = envelope
        .chart
        .result
        .and_then(|mut results| (!results.is_empty()).then(|| results.remove(0)))
        .ok_or(FetchError::NotFound)?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (idx, ts) in result.timestamp.iter().enumerate() {
        let Some(local) = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0) else {
            return Err(FetchError::Malformed(format!("invalid timestamp {ts}")));
        };
        bars.push(DailyBar {
            date: local.date_naive(),
            open: cell(&quote.open, idx),
            close: cell(&quote.close, idx),
            volume: cell(&quote.volume, idx),
        });
    }
    Ok(PriceSeries::new(ticker, bars))
}

fn cell(values: &[Option<f64>], idx: usize) -> Option<Decimal> {
    values
        .get(idx)
        .copied()
        .flatten()
        .filter(|value| value.is_finite())
        .and_then(Decimal::from_f64)
        .map(|value| value.round_dp(4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::time::{Duration as StdDuration, Instant};
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "TWD", "symbol": "2330.TW", "gmtoffset": 28800},
                "timestamp": [1735779600, 1735866000, 1736125200],
                "indicators": {"quote": [{
                    "open": [1070.0, 1075.0, null],
                    "high": [1080.0, 1085.0, 1090.0],
                    "low": [1060.0, 1065.0, 1070.0],
                    "close": [1075.0, 1080.0, 1085.0],
                    "volume": [25000000, 31000000, 28000000]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_chart_payload_with_nulls() {
        let series = parse_chart(TickerId::from("2330.TW"), SAMPLE).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.bars()[0].date,
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
        );
        assert_eq!(series.bars()[1].close, Some(dec!(1080)));
        assert_eq!(series.bars()[2].open, None);
        assert_eq!(series.cleaned().len(), 2);
    }

    #[test]
    fn maps_not_found_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert_eq!(
            parse_chart(TickerId::from("0000.TW"), body),
            Err(FetchError::NotFound)
        );
    }

    async fn chart_server(delay: StdDuration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v8/finance/chart/.+$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SAMPLE)
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    fn batch(count: u32) -> Vec<TickerId> {
        (0..count)
            .map(|idx| TickerId::from(format!("{}.TW", 2330 + idx)))
            .collect()
    }

    #[tokio::test]
    async fn batch_requests_respect_in_flight_cap() {
        let server = chart_server(StdDuration::from_millis(100)).await;
        let supplier = YahooChartSupplier::new(server.uri()).with_max_in_flight(2);
        let tickers = batch(6);

        let start = Instant::now();
        let response = supplier.fetch(&tickers, 30).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(response.len(), 6);
        assert!(response.values().all(Result::is_ok));
        assert!(
            elapsed >= StdDuration::from_millis(300),
            "six requests two at a time finished in {elapsed:?}"
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn every_request_waits_on_the_limiter() {
        let server = chart_server(StdDuration::ZERO).await;
        let supplier =
            YahooChartSupplier::new(server.uri()).with_limiter(RateLimiter::per_second(2));

        let start = Instant::now();
        let response = supplier.fetch(&batch(4), 30).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(response.len(), 4);
        assert!(
            elapsed >= StdDuration::from_millis(900),
            "four requests at two per second finished in {elapsed:?}"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_chart(TickerId::from("2330.TW"), "<html>"),
            Err(FetchError::Malformed(_))
        ));
    }
}
