use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::account::Account;
use crate::error::{StoreError, StoreResult};
use crate::store::AccountStore;

const ACCOUNT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    owner TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQLite-backed store holding one JSON row per account.
#[derive(Clone, Debug)]
pub struct SqliteAccountStore {
    path: PathBuf,
}

impl SqliteAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self { path: path.into() };
        store.connect()?.execute_batch(ACCOUNT_SCHEMA)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> StoreResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Ok(conn)
    }
}

impl AccountStore for SqliteAccountStore {
    fn load(&self, owner: &str) -> StoreResult<Option<Account>> {
        let conn = self.connect()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM accounts WHERE owner = ?1",
                params![owner],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|json| {
                serde_json::from_str(&json).map_err(|err| {
                    StoreError::Serialization(format!("invalid account row for {owner}: {err}"))
                })
            })
            .transpose()
    }

    fn save(&self, account: &Account) -> StoreResult<()> {
        let payload = serde_json::to_string(account)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO accounts (owner, payload, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![account.owner, payload, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(owner = %account.owner, fills = account.history.len(), "account saved");
        Ok(())
    }

    fn owners(&self) -> StoreResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT owner FROM accounts ORDER BY owner")?;
        let owners = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Fill;
    use radar_core::TickerId;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn round_trips_accounts_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("accounts.db");
        let store = SqliteAccountStore::new(&path).unwrap();
        let account = store
            .load_or_create("carol", dec!(1000000))
            .unwrap()
            .apply_fill(Fill::buy("2330.TW", 3, dec!(101.5)))
            .unwrap();
        store.save(&account).unwrap();

        let reopened = SqliteAccountStore::new(&path).unwrap();
        let loaded = reopened.load("carol").unwrap().unwrap();
        assert_eq!(loaded, account);
        assert_eq!(
            loaded.holding(&TickerId::from("2330.TW")).unwrap().lots,
            3
        );
        assert!(reopened.load("dave").unwrap().is_none());
        assert_eq!(reopened.owners().unwrap(), vec!["carol".to_string()]);
    }

    #[test]
    fn corrupt_rows_surface_as_serialization_errors() {
        let dir = tempdir().unwrap();
        let store = SqliteAccountStore::new(dir.path().join("accounts.db")).unwrap();
        store
            .connect()
            .unwrap()
            .execute(
                "INSERT INTO accounts (owner, payload, updated_at) VALUES ('eve', '{', '')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.load("eve"),
            Err(StoreError::Serialization(_))
        ));
    }
}
