//! Persistent key/value store for the client session cache.
//!
//! Values are opaque strings (the client stores JSON blobs). Writes are
//! synchronous: once `set` returns, the value is on disk.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::ts;

impl Database {
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, ts(&Utc::now())],
        )?;
        Ok(())
    }

    /// Returns `true` if a value was removed.
    pub fn kv_remove(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    pub fn kv_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare("SELECT key FROM kv ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

/// String-keyed storage that outlives the process.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// [`LocalStore`] backed by the `kv` table of a SQLite database.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Database::open_default("baseseva-client.db").map(Self::new)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Database::open_at(path).map(Self::new)
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&guard)
    }
}

impl LocalStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_db(|db| db.kv_get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_db(|db| db.kv_set(key, value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_db(|db| db.kv_remove(key).map(|_| ()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_db(|db| db.kv_keys())
    }
}

/// Volatile [`LocalStore`], for tests and for sessions that must not touch
/// the disk.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn LocalStore) {
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("user", r#"{"a":1}"#).unwrap();
        assert_eq!(store.get("user").unwrap().as_deref(), Some(r#"{"a":1}"#));

        store.set("user", r#"{"a":2}"#).unwrap();
        assert_eq!(store.get("user").unwrap().as_deref(), Some(r#"{"a":2}"#));

        store.set("session", "true").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["session", "user"]);

        store.remove("user").unwrap();
        store.remove("user").unwrap();
        assert_eq!(store.get("user").unwrap(), None);
        assert_eq!(store.keys().unwrap(), vec!["session"]);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        exercise(&SqliteStore::new(Database::open_in_memory().unwrap()));
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");

        {
            let store = SqliteStore::open_at(&path).unwrap();
            store.set("baseseva_user", "{}").unwrap();
        }

        let store = SqliteStore::open_at(&path).unwrap();
        assert_eq!(store.get("baseseva_user").unwrap().as_deref(), Some("{}"));
    }
}
