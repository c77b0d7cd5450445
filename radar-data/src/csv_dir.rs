use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use radar_core::{DailyBar, PriceSeries, TickerId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::task;
use tracing::debug;

use crate::supplier::{FetchError, FetchResponse, HistoricalDataSupplier, SupplierError};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: Option<Decimal>,
    close: Option<Decimal>,
    volume: Option<Decimal>,
}

/// Reads `<dir>/<ticker>.csv` files with a `date,open,close,volume` header.
///
/// Extra columns are ignored and blank cells become missing fields.
#[derive(Clone, Debug)]
pub struct CsvDirectorySupplier {
    root: PathBuf,
}

impl CsvDirectorySupplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, ticker: &TickerId) -> PathBuf {
        self.root.join(format!("{}.csv", ticker.as_str()))
    }

    /// Every ticker with a CSV file in the directory, sorted.
    pub fn tickers(&self) -> Result<Vec<TickerId>, SupplierError> {
        let entries = fs::read_dir(&self.root).map_err(|err| {
            SupplierError::Unavailable(format!("cannot list {}: {err}", self.root.display()))
        })?;
        let mut tickers: Vec<TickerId> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(TickerId::from)
            })
            .collect();
        tickers.sort();
        Ok(tickers)
    }
}

/// Parses one ticker's CSV file.
pub fn read_series(path: &Path, ticker: TickerId) -> Result<PriceSeries, FetchError> {
    if !path.exists() {
        return Err(FetchError::NotFound);
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| FetchError::Transport(err.to_string()))?;
    let mut bars = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|err| FetchError::Malformed(err.to_string()))?;
        bars.push(DailyBar {
            date: row.date,
            open: row.open,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(PriceSeries::new(ticker, bars))
}

#[async_trait]
impl HistoricalDataSupplier for CsvDirectorySupplier {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch(
        &self,
        tickers: &[TickerId],
        lookback_days: u32,
    ) -> Result<FetchResponse, SupplierError> {
        if !self.root.is_dir() {
            return Err(SupplierError::Unavailable(format!(
                "{} is not a readable directory",
                self.root.display()
            )));
        }
        let jobs: Vec<(TickerId, PathBuf)> = tickers
            .iter()
            .map(|ticker| (ticker.clone(), self.path_for(ticker)))
            .collect();
        let response = task::spawn_blocking(move || {
            jobs.into_iter()
                .map(|(ticker, path)| {
                    let series = read_series(&path, ticker.clone())
                        .map(|series| series.within_lookback(lookback_days));
                    if let Err(err) = &series {
                        debug!(ticker = %ticker, error = %err, "csv series unavailable");
                    }
                    (ticker, series)
                })
                .collect::<FetchResponse>()
        })
        .await
        .map_err(|err| SupplierError::Unavailable(format!("csv reader task failed: {err}")))?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_rows_with_gaps_and_missing_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("2330.TW.csv"),
            "date,open,high,low,close,volume\n\
             2025-01-02,100,101,99,100,1500000\n\
             2025-01-03,100,101,99,,1500000\n\
             2025-01-06,101,102,100,101.5,2000000\n",
        )
        .unwrap();
        let supplier = CsvDirectorySupplier::new(dir.path());
        assert_eq!(supplier.tickers().unwrap(), vec![TickerId::from("2330.TW")]);

        let response = supplier
            .fetch(&[TickerId::from("2330.TW"), TickerId::from("2317.TW")], 365)
            .await
            .unwrap();
        let series = response[&TickerId::from("2330.TW")].as_ref().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[1].close, None);
        assert_eq!(series.cleaned().last().unwrap().close, dec!(101.5));
        assert_eq!(
            response[&TickerId::from("2317.TW")],
            Err(FetchError::NotFound)
        );
    }

    #[tokio::test]
    async fn missing_directory_fails_the_batch() {
        let supplier = CsvDirectorySupplier::new("/nonexistent/radar/bars");
        let err = supplier
            .fetch(&[TickerId::from("2330.TW")], 30)
            .await
            .unwrap_err();
        assert!(matches!(err, SupplierError::Unavailable(_)));
    }
}
