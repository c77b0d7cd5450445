use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::account::Account;
use crate::error::StoreResult;

/// Persistence for accounts keyed by owner name.
pub trait AccountStore: Send + Sync {
    fn load(&self, owner: &str) -> StoreResult<Option<Account>>;

    fn save(&self, account: &Account) -> StoreResult<()>;

    fn owners(&self) -> StoreResult<Vec<String>>;

    /// Loads `owner`, creating and saving a fresh account when none exists.
    fn load_or_create(&self, owner: &str, starting_cash: Decimal) -> StoreResult<Account> {
        if let Some(account) = self.load(owner)? {
            return Ok(account);
        }
        let account = Account::new(owner, starting_cash);
        self.save(&account)?;
        Ok(account)
    }
}

/// Process-local store used by tests and demos.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn load(&self, owner: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().get(owner).cloned())
    }

    fn save(&self, account: &Account) -> StoreResult<()> {
        self.accounts
            .write()
            .insert(account.owner.clone(), account.clone());
        Ok(())
    }

    fn owners(&self) -> StoreResult<Vec<String>> {
        let mut owners: Vec<String> = self.accounts.read().keys().cloned().collect();
        owners.sort();
        Ok(owners)
    }
}
