//! Built-in indicator implementations provided by the crate.

pub mod sma;
pub mod weekly;

pub use sma::Sma;
pub use weekly::WeeklyCloses;
