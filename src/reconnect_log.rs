//! Capped audit trail of mount attempts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::store::{load_json, save_json, KeyValueStore, KEY_RECONNECTION_LOGS};

/// Maximum number of entries kept; older entries are dropped first.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Outcome of one mount attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectionLogEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub share_name: String,
    pub remote_address: String,
    pub mount_point_path: String,
    pub success: bool,
    pub message: String,
}

impl ReconnectionLogEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        share_name: impl Into<String>,
        remote_address: impl Into<String>,
        mount_point_path: impl Into<String>,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            share_name: share_name.into(),
            remote_address: remote_address.into(),
            mount_point_path: mount_point_path.into(),
            success,
            message: message.into(),
        }
    }

    /// `Success` / `Failed` label for tables.
    pub fn status_label(&self) -> &'static str {
        if self.success {
            "Success"
        } else {
            "Failed"
        }
    }

    /// Local time as `yyyy-MM-dd HH:mm:ss`.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Append-only log of attempts, persisted after every change.
pub struct ReconnectionLog {
    entries: Vec<ReconnectionLogEntry>,
    store: Arc<dyn KeyValueStore>,
}

impl ReconnectionLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: Vec::new(),
            store,
        }
    }

    /// Load persisted entries; an undecodable log starts empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut log = Self::new(store);
        log.reload();
        log
    }

    /// Replace the in-memory entries with the persisted ones.
    ///
    /// A missing key means the log was cleared. An undecodable value leaves
    /// the in-memory entries alone.
    pub fn reload(&mut self) {
        match load_json::<Vec<ReconnectionLogEntry>>(self.store.as_ref(), KEY_RECONNECTION_LOGS) {
            Ok(Some(entries)) => {
                self.entries = entries;
                self.truncate();
            }
            Ok(None) => self.entries.clear(),
            Err(e) => warn!(error = %e, "Ignoring undecodable reconnection logs"),
        }
    }

    /// Append an entry, keeping only the newest [`MAX_LOG_ENTRIES`].
    pub fn append(&mut self, entry: ReconnectionLogEntry) {
        self.entries.push(entry);
        self.truncate();
        self.persist();
    }

    /// Entries in insertion order.
    pub fn list(&self) -> &[ReconnectionLogEntry] {
        &self.entries
    }

    /// Entries sorted by timestamp, newest first.
    pub fn newest_first(&self) -> Vec<ReconnectionLogEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted
    }

    /// Drop every entry and delete the persisted log.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.store.remove(KEY_RECONNECTION_LOGS) {
            error!(error = %e, "Failed to delete reconnection logs");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn truncate(&mut self) {
        if self.entries.len() > MAX_LOG_ENTRIES {
            let excess = self.entries.len() - MAX_LOG_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    fn persist(&self) {
        if let Err(e) = save_json(self.store.as_ref(), KEY_RECONNECTION_LOGS, &self.entries) {
            error!(error = %e, "Failed to save reconnection logs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn entry(n: i64) -> ReconnectionLogEntry {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap();
        ReconnectionLogEntry::new(
            base + Duration::seconds(n),
            format!("share-{}", n),
            "smb://nas.local/Media",
            "/Volumes/Media",
            n % 2 == 0,
            format!("attempt {}", n),
        )
    }

    #[test]
    fn test_append_and_list() {
        let mut log = ReconnectionLog::new(Arc::new(MemoryStore::new()));
        log.append(entry(1));
        log.append(entry(2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.list()[0].share_name, "share-1");
        assert_eq!(log.list()[1].share_name, "share-2");
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut log = ReconnectionLog::new(Arc::new(MemoryStore::new()));
        for n in 0..=100 {
            log.append(entry(n));
        }

        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert!(log.list().iter().all(|e| e.share_name != "share-0"));
        assert_eq!(log.list().last().unwrap().share_name, "share-100");
    }

    #[test]
    fn test_persisted_log_is_capped() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ReconnectionLog::new(store.clone());
        for n in 0..150 {
            log.append(entry(n));
        }

        let reloaded = ReconnectionLog::load(store);
        assert_eq!(reloaded.len(), MAX_LOG_ENTRIES);
        assert_eq!(reloaded.list()[0].share_name, "share-50");
    }

    #[test]
    fn test_newest_first() {
        let mut log = ReconnectionLog::new(Arc::new(MemoryStore::new()));
        log.append(entry(5));
        log.append(entry(9));
        log.append(entry(1));

        let names: Vec<String> = log
            .newest_first()
            .into_iter()
            .map(|e| e.share_name)
            .collect();
        assert_eq!(names, vec!["share-9", "share-5", "share-1"]);
    }

    #[test]
    fn test_load_garbage_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_RECONNECTION_LOGS, "nope").unwrap();
        assert!(ReconnectionLog::load(store).is_empty());
    }

    #[test]
    fn test_clear() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ReconnectionLog::new(store.clone());
        log.append(entry(1));
        log.clear();
        assert!(log.is_empty());
        assert!(ReconnectionLog::load(store).is_empty());
    }

    #[test]
    fn test_clear_deletes_key() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ReconnectionLog::new(store.clone());
        log.append(entry(1));
        log.clear();
        assert_eq!(store.get(KEY_RECONNECTION_LOGS).unwrap(), None);
    }

    #[test]
    fn test_reload_sees_other_writer() {
        let store = Arc::new(MemoryStore::new());
        let mut ours = ReconnectionLog::load(store.clone());
        let mut theirs = ReconnectionLog::load(store.clone());

        theirs.append(entry(1));
        ours.reload();
        assert_eq!(ours.len(), 1);

        theirs.clear();
        ours.reload();
        assert!(ours.is_empty());
    }

    #[test]
    fn test_reload_keeps_entries_on_garbage() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ReconnectionLog::new(store.clone());
        log.append(entry(1));

        store.set(KEY_RECONNECTION_LOGS, "nope").unwrap();
        log.reload();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_status_label() {
        assert_eq!(entry(2).status_label(), "Success");
        assert_eq!(entry(3).status_label(), "Failed");
    }
}
