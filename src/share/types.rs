//! Core share types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

/// Default root under which the OS places network volumes.
pub const DEFAULT_MOUNT_ROOT: &str = "/Volumes";

/// Stable identifier of a configured share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareId(pub Uuid);

impl ShareId {
    /// Generate a new random share ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShareId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShareId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A network share that should be kept mounted.
///
/// `connected_since` is only ever set while `is_connected` is true; use
/// [`Share::mark_connected`] and [`Share::mark_disconnected`] to move between
/// the two states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub id: ShareId,
    pub name: String,
    pub remote_address: Url,
    #[serde(default)]
    pub mount_point: Option<PathBuf>,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub connected_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Share {
    /// Create a disconnected share with a fresh ID.
    pub fn new(name: impl Into<String>, remote_address: Url, mount_point: Option<PathBuf>) -> Self {
        Self {
            id: ShareId::new(),
            name: name.into(),
            remote_address,
            mount_point,
            is_connected: false,
            connected_since: None,
            last_checked: None,
        }
    }

    /// Host part of the locator, if it has a non-empty one.
    pub fn host(&self) -> Option<&str> {
        self.remote_address.host_str().filter(|h| !h.is_empty())
    }

    /// Path part of the locator (e.g. `/Media`).
    pub fn remote_path(&self) -> &str {
        self.remote_address.path()
    }

    /// Where the share is (or would be) attached locally.
    pub fn effective_mount_point(&self, mount_root: &Path) -> PathBuf {
        self.mount_point
            .clone()
            .unwrap_or_else(|| system_mount_path(mount_root, &self.name))
    }

    /// Record a Disconnected -> Connected transition. No-op if already connected.
    pub fn mark_connected(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_connected {
            return false;
        }
        self.is_connected = true;
        self.connected_since = Some(now);
        true
    }

    /// Record a Connected -> Disconnected transition. No-op if already disconnected.
    pub fn mark_disconnected(&mut self) -> bool {
        if !self.is_connected {
            return false;
        }
        self.is_connected = false;
        self.connected_since = None;
        true
    }

    /// Copy connection state from another record of the same share.
    pub fn adopt_status(&mut self, other: &Share) {
        self.is_connected = other.is_connected;
        self.connected_since = other.connected_since;
        self.last_checked = other.last_checked;
    }

    /// Repair status fields of a record read back from storage.
    pub fn enforce_invariants(&mut self) {
        if !self.is_connected || self.connected_since.is_none() {
            self.is_connected = false;
            self.connected_since = None;
        }
    }

    /// "Connected for" label, empty when disconnected.
    pub fn formatted_connection_time(&self, now: DateTime<Utc>) -> String {
        match self.connected_since {
            Some(since) => format_connected_for(since, now),
            None => String::new(),
        }
    }

    /// "Last checked" label.
    pub fn formatted_last_checked(&self, now: DateTime<Utc>) -> String {
        match self.last_checked {
            Some(ts) => format_time_ago(ts, now),
            None => "Never".to_string(),
        }
    }
}

/// The OS-standard mount directory for a volume named `name`.
pub fn system_mount_path(mount_root: &Path, name: &str) -> PathBuf {
    mount_root.join(name)
}

/// Abbreviated duration such as `2d 3h` or `45m`, at most two units.
pub fn format_connected_for(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - since).num_minutes().max(0);
    let units = [
        (minutes / (24 * 60), "d"),
        ((minutes / 60) % 24, "h"),
        (minutes % 60, "m"),
    ];

    let parts: Vec<String> = units
        .iter()
        .filter(|(value, _)| *value > 0)
        .take(2)
        .map(|(value, suffix)| format!("{}{}", value, suffix))
        .collect();

    if parts.is_empty() {
        "0m".to_string()
    } else {
        parts.join(" ")
    }
}

/// Relative timestamp such as `3 minutes ago`.
pub fn format_time_ago(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - ts;
    let days = elapsed.num_days();
    let hours = elapsed.num_hours();
    let minutes = elapsed.num_minutes();
    let seconds = elapsed.num_seconds();

    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    }

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else if seconds >= 5 {
        format!("{} seconds ago", seconds)
    } else {
        "just now".to_string()
    }
}
