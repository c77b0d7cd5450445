//! Simulated trading accounts for following up on screener candidates.

pub mod account;
pub mod error;
pub mod sqlite;
pub mod store;

pub use account::{Account, Fill, Holding, DEFAULT_STARTING_CASH};
pub use error::{AccountError, AccountResult, StoreError, StoreResult};
pub use sqlite::SqliteAccountStore;
pub use store::{AccountStore, InMemoryAccountStore};
