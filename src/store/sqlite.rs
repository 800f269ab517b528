//! SQLite-backed key/value store
//!
//! Keeps engine state so shares and logs survive restarts.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{KeyValueStore, StoreError, StoreResult};

/// Key/value store persisted in a single SQLite table
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the specified path
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;
        let mut stmt = conn.prepare("SELECT value FROM kv_state WHERE key = ?1")?;

        let result: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;

        Ok(result)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_state (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;
        conn.execute("DELETE FROM kv_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Get the default database path
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jockey")
        .join("state.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().expect("Failed to open in-memory store");
        assert!(store.get("configuredShares").unwrap().is_none());
    }

    #[test]
    fn test_set_and_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("pollingInterval", "45").unwrap();
        assert_eq!(
            store.get("pollingInterval").unwrap(),
            Some("45".to_string())
        );
    }

    #[test]
    fn test_set_replaces() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("defaultMountPath", "\"/Volumes\"").unwrap();
        store.set("defaultMountPath", "\"/mnt\"").unwrap();
        assert_eq!(
            store.get("defaultMountPath").unwrap(),
            Some("\"/mnt\"".to_string())
        );
    }

    #[test]
    fn test_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("reconnectionLogs", "[]").unwrap();
        store.remove("reconnectionLogs").unwrap();
        assert!(store.get("reconnectionLogs").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("state.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("configuredShares", "[]").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("configuredShares").unwrap(),
            Some("[]".to_string())
        );
    }

    #[test]
    fn test_default_db_path() {
        let path = default_db_path();
        assert!(path.to_string_lossy().contains("jockey"));
        assert!(path.to_string_lossy().ends_with("state.db"));
    }
}
