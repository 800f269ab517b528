//! Key/value persistence for engine state.
//!
//! The engine persists four entries: the configured shares, the polling
//! interval, the reconnection log and the default mount root. Values are
//! JSON text, so any backend that can store strings by key will do.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::scheduler::PollingInterval;
use crate::share::DEFAULT_MOUNT_ROOT;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{default_db_path, SqliteStore};

/// Serialized array of shares.
pub const KEY_CONFIGURED_SHARES: &str = "configuredShares";
/// Polling interval in seconds.
pub const KEY_POLLING_INTERVAL: &str = "pollingInterval";
/// Serialized array of reconnection log entries.
pub const KEY_RECONNECTION_LOGS: &str = "reconnectionLogs";
/// Root directory for default mount points.
pub const KEY_DEFAULT_MOUNT_PATH: &str = "defaultMountPath";

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to acquire lock")]
    LockError,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// An opaque string store keyed by name.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never set.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Read and decode a JSON value.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Typed access to the scalar settings.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored polling interval. Absent, unreadable or non-positive values load as 30s.
    pub fn polling_interval(&self) -> PollingInterval {
        match load_json::<f64>(self.store.as_ref(), KEY_POLLING_INTERVAL) {
            Ok(Some(secs)) => PollingInterval::from_stored(secs),
            Ok(None) => PollingInterval::default(),
            Err(e) => {
                warn!(error = %e, "Ignoring stored polling interval");
                PollingInterval::default()
            }
        }
    }

    pub fn set_polling_interval(&self, interval: PollingInterval) -> StoreResult<()> {
        save_json(self.store.as_ref(), KEY_POLLING_INTERVAL, &interval.as_secs_f64())
    }

    /// Root under which default mount points are derived.
    pub fn default_mount_path(&self) -> PathBuf {
        match load_json::<String>(self.store.as_ref(), KEY_DEFAULT_MOUNT_PATH) {
            Ok(Some(path)) if !path.trim().is_empty() => PathBuf::from(path),
            Ok(_) => PathBuf::from(DEFAULT_MOUNT_ROOT),
            Err(e) => {
                warn!(error = %e, "Ignoring stored default mount path");
                PathBuf::from(DEFAULT_MOUNT_ROOT)
            }
        }
    }

    pub fn set_default_mount_path(&self, path: &std::path::Path) -> StoreResult<()> {
        save_json(
            self.store.as_ref(),
            KEY_DEFAULT_MOUNT_PATH,
            &path.to_string_lossy(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn settings() -> (Arc<MemoryStore>, Settings) {
        let store = Arc::new(MemoryStore::new());
        let settings = Settings::new(store.clone());
        (store, settings)
    }

    #[test]
    fn test_polling_interval_defaults_to_30() {
        let (store, settings) = settings();
        assert_eq!(settings.polling_interval().as_secs(), 30);

        store.set(KEY_POLLING_INTERVAL, "0").unwrap();
        assert_eq!(settings.polling_interval().as_secs(), 30);

        store.set(KEY_POLLING_INTERVAL, "-12.5").unwrap();
        assert_eq!(settings.polling_interval().as_secs(), 30);

        store.set(KEY_POLLING_INTERVAL, "\"fast\"").unwrap();
        assert_eq!(settings.polling_interval().as_secs(), 30);
    }

    #[test]
    fn test_polling_interval_roundtrip() {
        let (_store, settings) = settings();
        settings
            .set_polling_interval(PollingInterval::clamped(120.0))
            .unwrap();
        assert_eq!(settings.polling_interval().as_secs(), 120);
    }

    #[test]
    fn test_default_mount_path() {
        let (store, settings) = settings();
        assert_eq!(settings.default_mount_path(), PathBuf::from("/Volumes"));

        settings
            .set_default_mount_path(Path::new("/mnt/shares"))
            .unwrap();
        assert_eq!(settings.default_mount_path(), PathBuf::from("/mnt/shares"));

        store.set(KEY_DEFAULT_MOUNT_PATH, "\"  \"").unwrap();
        assert_eq!(settings.default_mount_path(), PathBuf::from("/Volumes"));
    }

    #[test]
    fn test_load_json_decode_error() {
        let (store, _) = settings();
        store.set(KEY_CONFIGURED_SHARES, "{not json").unwrap();
        let result = load_json::<Vec<String>>(store.as_ref(), KEY_CONFIGURED_SHARES);
        assert!(matches!(result, Err(StoreError::Decode { .. })));
    }

    #[test]
    fn test_load_json_missing_key() {
        let (store, _) = settings();
        let result = load_json::<Vec<String>>(store.as_ref(), KEY_RECONNECTION_LOGS).unwrap();
        assert!(result.is_none());
    }
}
