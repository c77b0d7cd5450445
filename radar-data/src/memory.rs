use std::collections::HashMap;

use async_trait::async_trait;
use radar_core::{PriceSeries, TickerId};

use crate::supplier::{FetchError, FetchResponse, HistoricalDataSupplier, SupplierError};

/// Serves a fixed set of series from memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySupplier {
    series: HashMap<TickerId, PriceSeries>,
}

impl InMemorySupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.ticker.clone(), series);
    }

    pub fn tickers(&self) -> Vec<TickerId> {
        let mut tickers: Vec<_> = self.series.keys().cloned().collect();
        tickers.sort();
        tickers
    }
}

impl FromIterator<PriceSeries> for InMemorySupplier {
    fn from_iter<T: IntoIterator<Item = PriceSeries>>(iter: T) -> Self {
        let mut supplier = Self::new();
        for series in iter {
            supplier.insert(series);
        }
        supplier
    }
}

#[async_trait]
impl HistoricalDataSupplier for InMemorySupplier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(
        &self,
        tickers: &[TickerId],
        lookback_days: u32,
    ) -> Result<FetchResponse, SupplierError> {
        Ok(tickers
            .iter()
            .map(|ticker| {
                let entry = self
                    .series
                    .get(ticker)
                    .cloned()
                    .map(|series| series.within_lookback(lookback_days))
                    .ok_or(FetchError::NotFound);
                (ticker.clone(), entry)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use radar_core::DailyBar;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn returns_known_series_and_flags_unknown() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bars = (0..30)
            .map(|i| DailyBar::new(start + Duration::days(i), dec!(10), dec!(10), dec!(1000)))
            .collect();
        let supplier: InMemorySupplier =
            std::iter::once(PriceSeries::new(TickerId::from("1101.TW"), bars)).collect();

        let response = supplier
            .fetch(&[TickerId::from("1101.TW"), TickerId::from("9999.TW")], 10)
            .await
            .unwrap();
        let series = response[&TickerId::from("1101.TW")].as_ref().unwrap();
        assert_eq!(series.len(), 10);
        assert_eq!(
            response[&TickerId::from("9999.TW")],
            Err(FetchError::NotFound)
        );
    }
}
