//! Data access for the Radar screener: historical bar suppliers, universe
//! listings, industry metadata and request throttling.

pub mod csv_dir;
pub mod limiter;
pub mod memory;
pub mod supplier;
pub mod universe;
pub mod yahoo;

pub use csv_dir::CsvDirectorySupplier;
pub use limiter::RateLimiter;
pub use memory::InMemorySupplier;
pub use supplier::{FetchError, FetchResponse, HistoricalDataSupplier, SupplierError};
pub use universe::{
    CachedUniverse, CodeRangeClassifier, CodeRangeUniverse, IndustryClassifier, StaticUniverse,
    UniverseSource,
};
pub use yahoo::YahooChartSupplier;
