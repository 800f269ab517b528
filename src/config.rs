//! Configuration management for jockey
//!
//! Handles loading and saving configuration from ~/.config/jockey/config.toml.
//! Every field is optional; the `effective_*` accessors fill in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::detect::{
    find_listing_tool, SystemHost, DEFAULT_LISTING_TIMEOUT, DEFAULT_NETWORK_MARKER,
};
use crate::engine::DEFAULT_RECHECK_DELAYS;
use crate::mount::{
    DirectMount, FinderMount, MountMechanism, MountOrchestrator, UnmountTool,
    DEFAULT_AUTOMATION_TOOL, DEFAULT_MOUNT_TOOL, DEFAULT_TOOL_TIMEOUT, DEFAULT_UNMOUNT_TOOL,
};
use crate::store::default_db_path;

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Application name for config directory
const APP_NAME: &str = "jockey";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Mount utility invoked with `<locator> <mount path>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_tool: Option<PathBuf>,

    /// Unmount utility invoked with `<mount path>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmount_tool: Option<PathBuf>,

    /// Scripting utility fed the Finder mount script on stdin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_tool: Option<PathBuf>,

    /// Utility listing mounted filesystems
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_tool: Option<PathBuf>,

    /// Substring marking network mounts in the listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_marker: Option<String>,

    /// Seconds before a mount mechanism is killed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_timeout_secs: Option<u64>,

    /// Seconds before the mount listing is killed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_timeout_secs: Option<u64>,

    /// Delays of the confirmation re-checks after a mount attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recheck_delays_secs: Option<Vec<u64>>,

    /// Path of the state database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the config file path
    ///
    /// Returns ~/.config/jockey/config.toml on Linux/macOS
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Get the config directory path
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_NAME))
    }

    /// Load configuration from the default location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, defaults if it doesn't exist
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check if any configuration is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn effective_mount_tool(&self) -> PathBuf {
        self.mount_tool
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT_TOOL))
    }

    pub fn effective_unmount_tool(&self) -> PathBuf {
        self.unmount_tool
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UNMOUNT_TOOL))
    }

    pub fn effective_automation_tool(&self) -> PathBuf {
        self.automation_tool
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUTOMATION_TOOL))
    }

    /// Configured listing tool, or the first candidate present on this host
    pub fn effective_listing_tool(&self) -> Option<PathBuf> {
        self.listing_tool.clone().or_else(find_listing_tool)
    }

    pub fn effective_network_marker(&self) -> &str {
        self.network_marker
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_NETWORK_MARKER)
    }

    pub fn effective_mount_timeout(&self) -> Duration {
        self.mount_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOOL_TIMEOUT)
    }

    pub fn effective_listing_timeout(&self) -> Duration {
        self.listing_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LISTING_TIMEOUT)
    }

    pub fn effective_recheck_delays(&self) -> Vec<Duration> {
        match &self.recheck_delays_secs {
            Some(delays) => delays.iter().copied().map(Duration::from_secs).collect(),
            None => DEFAULT_RECHECK_DELAYS.to_vec(),
        }
    }

    pub fn effective_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    /// Host probe built from the listing settings
    pub fn system_host(&self) -> SystemHost {
        SystemHost::new(self.effective_listing_tool(), self.effective_network_marker())
            .with_timeout(self.effective_listing_timeout())
    }

    /// Mount utility first, Finder automation second
    pub fn orchestrator(&self) -> MountOrchestrator {
        let timeout = self.effective_mount_timeout();
        MountOrchestrator::new(
            vec![
                Box::new(DirectMount::new(self.effective_mount_tool()).with_timeout(timeout))
                    as Box<dyn MountMechanism>,
                Box::new(FinderMount::new(self.effective_automation_tool()).with_timeout(timeout)),
            ],
            UnmountTool::new(self.effective_unmount_tool()).with_timeout(timeout),
        )
    }
}

/// Format the configuration for display
pub fn format_config(config: &Config) -> String {
    fn path_line(key: &str, value: &Option<PathBuf>, default: &Path) -> String {
        match value {
            Some(path) => format!("  {} = \"{}\"", key, path.display()),
            None => format!("  {} = (not set, using {})", key, default.display()),
        }
    }

    let mut lines = Vec::new();

    lines.push("Current configuration:".to_string());
    lines.push(String::new());

    lines.push(path_line("mount_tool", &config.mount_tool, Path::new(DEFAULT_MOUNT_TOOL)));
    lines.push(path_line(
        "unmount_tool",
        &config.unmount_tool,
        Path::new(DEFAULT_UNMOUNT_TOOL),
    ));
    lines.push(path_line(
        "automation_tool",
        &config.automation_tool,
        Path::new(DEFAULT_AUTOMATION_TOOL),
    ));

    match (&config.listing_tool, find_listing_tool()) {
        (Some(path), _) => lines.push(format!("  listing_tool = \"{}\"", path.display())),
        (None, Some(found)) => lines.push(format!(
            "  listing_tool = (not set, using {})",
            found.display()
        )),
        (None, None) => lines.push("  listing_tool = (not set, none found)".to_string()),
    }

    if let Some(ref marker) = config.network_marker {
        lines.push(format!("  network_marker = \"{}\"", marker));
    } else {
        lines.push(format!(
            "  network_marker = (not set, using {})",
            DEFAULT_NETWORK_MARKER
        ));
    }

    if let Some(secs) = config.mount_timeout_secs {
        lines.push(format!("  mount_timeout_secs = {}", secs));
    } else {
        lines.push(format!(
            "  mount_timeout_secs = (not set, using {})",
            DEFAULT_TOOL_TIMEOUT.as_secs()
        ));
    }

    if let Some(secs) = config.listing_timeout_secs {
        lines.push(format!("  listing_timeout_secs = {}", secs));
    } else {
        lines.push(format!(
            "  listing_timeout_secs = (not set, using {})",
            DEFAULT_LISTING_TIMEOUT.as_secs()
        ));
    }

    if let Some(ref delays) = config.recheck_delays_secs {
        lines.push(format!("  recheck_delays_secs = {:?}", delays));
    } else {
        lines.push("  recheck_delays_secs = (not set, using [1, 3])".to_string());
    }

    lines.push(path_line("db_path", &config.db_path, &default_db_path()));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.mount_tool.is_none());
        assert!(config.network_marker.is_none());
        assert!(config.is_empty());
    }

    #[test]
    fn test_effective_defaults() {
        let config = Config::new();
        assert_eq!(config.effective_mount_tool(), PathBuf::from("/sbin/mount_smbfs"));
        assert_eq!(config.effective_unmount_tool(), PathBuf::from("/sbin/umount"));
        assert_eq!(
            config.effective_automation_tool(),
            PathBuf::from("/usr/bin/osascript")
        );
        assert_eq!(config.effective_network_marker(), "smbfs");
        assert_eq!(config.effective_mount_timeout(), Duration::from_secs(10));
        assert_eq!(config.effective_listing_timeout(), Duration::from_secs(2));
        assert_eq!(
            config.effective_recheck_delays(),
            vec![Duration::from_secs(1), Duration::from_secs(3)]
        );
    }

    #[test]
    fn test_effective_overrides() {
        let config = Config {
            listing_tool: Some(PathBuf::from("/opt/bin/mount")),
            network_marker: Some("cifs".to_string()),
            mount_timeout_secs: Some(30),
            recheck_delays_secs: Some(vec![]),
            ..Default::default()
        };

        assert_eq!(
            config.effective_listing_tool(),
            Some(PathBuf::from("/opt/bin/mount"))
        );
        assert_eq!(config.effective_network_marker(), "cifs");
        assert_eq!(config.effective_mount_timeout(), Duration::from_secs(30));
        assert!(config.effective_recheck_delays().is_empty());
        assert!(!config.is_empty());
    }

    #[test]
    fn test_empty_marker_falls_back() {
        let config = Config {
            network_marker: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.effective_network_marker(), "smbfs");
    }

    #[test]
    fn test_config_serialize_empty() {
        let config = Config::new();
        let toml_str = toml::to_string(&config).unwrap();

        assert!(!toml_str.contains("mount_tool"));
        assert!(!toml_str.contains("db_path"));
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
            mount_tool = "/usr/local/sbin/mount_smbfs"
            recheck_delays_secs = [2, 5]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.mount_tool,
            Some(PathBuf::from("/usr/local/sbin/mount_smbfs"))
        );
        assert_eq!(
            config.effective_recheck_delays(),
            vec![Duration::from_secs(2), Duration::from_secs(5)]
        );
        assert!(config.unmount_tool.is_none());
    }

    #[test]
    fn test_orchestrator_from_config() {
        let orch = Config::new().orchestrator();
        assert_eq!(orch.mechanism_names(), vec!["direct", "finder"]);
    }

    #[test]
    fn test_format_config_empty() {
        let output = format_config(&Config::new());

        assert!(output.contains("mount_tool = (not set, using /sbin/mount_smbfs)"));
        assert!(output.contains("network_marker = (not set, using smbfs)"));
        assert!(output.contains("mount_timeout_secs = (not set, using 10)"));
        assert!(output.contains("recheck_delays_secs = (not set, using [1, 3])"));
    }

    #[test]
    fn test_format_config_with_values() {
        let config = Config {
            unmount_tool: Some(PathBuf::from("/usr/bin/umount")),
            listing_timeout_secs: Some(5),
            recheck_delays_secs: Some(vec![1]),
            ..Default::default()
        };

        let output = format_config(&config);

        assert!(output.contains("unmount_tool = \"/usr/bin/umount\""));
        assert!(output.contains("listing_timeout_secs = 5"));
        assert!(output.contains("recheck_delays_secs = [1]"));
    }

    #[test]
    fn test_config_path() {
        if let Ok(path) = Config::config_path() {
            assert!(path.to_string_lossy().contains("jockey"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            network_marker: Some("cifs".to_string()),
            mount_timeout_secs: Some(15),
            db_path: Some(temp_dir.path().join("state.db")),
            ..Default::default()
        };
        config.save_to(&config_path).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "mount_timeout_secs = \"soon\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
