//! Probes into the host's mount state.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::mount_table::{parse_mount_table, MountedVolume, DEFAULT_NETWORK_MARKER};
use crate::mount::process::{run_tool, tool_name};
use crate::mount::{MountError, MountResult};

/// Places the mount-listing utility is usually installed.
pub const MOUNT_LISTING_CANDIDATES: &[&str] =
    &["/sbin/mount", "/bin/mount", "/usr/bin/mount", "/usr/sbin/mount"];

/// Default bound on the mount-listing utility.
pub const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(2);

/// What the detector needs to know about the host.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Whether `path` currently exists as a mounted path.
    async fn path_is_mounted(&self, path: &Path) -> bool;

    /// Network volumes currently mounted, in listing order.
    async fn mounted_volumes(&self) -> MountResult<Vec<MountedVolume>>;
}

/// Probes the real host through the filesystem and the mount-listing utility.
#[derive(Debug, Clone)]
pub struct SystemHost {
    listing_tool: Option<PathBuf>,
    listing_args: Vec<String>,
    marker: String,
    timeout: Duration,
}

impl SystemHost {
    pub fn new(listing_tool: Option<PathBuf>, marker: impl Into<String>) -> Self {
        Self {
            listing_tool,
            listing_args: Vec::new(),
            marker: marker.into(),
            timeout: DEFAULT_LISTING_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for the mount-listing utility (none by default).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.listing_args = args;
        self
    }

    pub fn listing_tool(&self) -> Option<&Path> {
        self.listing_tool.as_deref()
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new(find_listing_tool(), DEFAULT_NETWORK_MARKER)
    }
}

/// First mount-listing candidate that exists on this host.
pub fn find_listing_tool() -> Option<PathBuf> {
    MOUNT_LISTING_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[async_trait]
impl HostProbe for SystemHost {
    async fn path_is_mounted(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn mounted_volumes(&self) -> MountResult<Vec<MountedVolume>> {
        let tool = self.listing_tool.as_deref().ok_or_else(|| {
            MountError::launch(
                "mount",
                io::Error::new(io::ErrorKind::NotFound, "mount command not found"),
            )
        })?;

        let output = run_tool(tool, &self.listing_args, None, self.timeout).await?;
        if !output.success() {
            return Err(MountError::ExitStatus {
                tool: tool_name(tool),
                status: output.code_label(),
                output: output.diagnostic(),
            });
        }

        let volumes = parse_mount_table(&output.stdout, &self.marker);
        debug!(count = volumes.len(), "Listed mounted network volumes");
        Ok(volumes)
    }
}

/// A scripted host for tests and dry runs.
///
/// Paths and volumes are set explicitly; nothing touches the real system.
#[derive(Debug, Default)]
pub struct StaticHost {
    mounted_paths: Mutex<HashSet<PathBuf>>,
    volumes: Mutex<Vec<MountedVolume>>,
    listing_fails: Mutex<bool>,
    listing_calls: AtomicUsize,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` report as mounted.
    pub fn mount_path(&self, path: impl Into<PathBuf>) {
        if let Ok(mut paths) = self.mounted_paths.lock() {
            paths.insert(path.into());
        }
    }

    pub fn unmount_path(&self, path: &Path) {
        if let Ok(mut paths) = self.mounted_paths.lock() {
            paths.remove(path);
        }
    }

    pub fn set_volumes(&self, volumes: Vec<MountedVolume>) {
        if let Ok(mut current) = self.volumes.lock() {
            *current = volumes;
        }
    }

    /// Make the volume listing fail as if the utility timed out.
    pub fn fail_listing(&self, fail: bool) {
        if let Ok(mut flag) = self.listing_fails.lock() {
            *flag = fail;
        }
    }

    /// Number of times the volume listing was requested.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostProbe for StaticHost {
    async fn path_is_mounted(&self, path: &Path) -> bool {
        self.mounted_paths
            .lock()
            .map(|paths| paths.contains(path))
            .unwrap_or(false)
    }

    async fn mounted_volumes(&self) -> MountResult<Vec<MountedVolume>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);

        if self.listing_fails.lock().map(|f| *f).unwrap_or(false) {
            return Err(MountError::Timeout {
                tool: "mount".to_string(),
                after: DEFAULT_LISTING_TIMEOUT,
            });
        }

        Ok(self
            .volumes
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_system_host_path_probe() {
        let temp_dir = TempDir::new().unwrap();
        let host = SystemHost::new(None, DEFAULT_NETWORK_MARKER);

        assert!(host.path_is_mounted(temp_dir.path()).await);
        assert!(!host.path_is_mounted(&temp_dir.path().join("missing")).await);
    }

    #[tokio::test]
    async fn test_system_host_without_listing_tool() {
        let host = SystemHost::new(None, DEFAULT_NETWORK_MARKER);
        let err = host.mounted_volumes().await.unwrap_err();
        assert!(matches!(err, MountError::Launch { .. }));
    }

    fn shell_host(script: &str) -> SystemHost {
        SystemHost::new(Some(PathBuf::from("sh")), DEFAULT_NETWORK_MARKER)
            .with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_system_host_parses_listing_output() {
        let host = shell_host(
            "echo '/dev/disk1 on / (apfs, local)'; \
             echo '//user@nas.local/Media on /Volumes/Media (smbfs, nodev, nosuid)'",
        );
        let volumes = host.mounted_volumes().await.unwrap();

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].locator, "smb://user@nas.local/Media");
        assert_eq!(volumes[0].mount_path, PathBuf::from("/Volumes/Media"));
    }

    #[tokio::test]
    async fn test_system_host_listing_failure() {
        let host = shell_host("exit 2");
        let err = host.mounted_volumes().await.unwrap_err();
        assert!(matches!(err, MountError::ExitStatus { .. }));
    }

    #[tokio::test]
    async fn test_system_host_listing_timeout() {
        let host = shell_host("sleep 10").with_timeout(Duration::from_millis(200));
        let err = host.mounted_volumes().await.unwrap_err();
        assert!(matches!(err, MountError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_static_host() {
        let host = StaticHost::new();
        host.mount_path("/Volumes/Media");
        assert!(host.path_is_mounted(Path::new("/Volumes/Media")).await);

        host.unmount_path(Path::new("/Volumes/Media"));
        assert!(!host.path_is_mounted(Path::new("/Volumes/Media")).await);

        host.set_volumes(vec![MountedVolume::new("//nas/Media", "/Volumes/Media")]);
        assert_eq!(host.mounted_volumes().await.unwrap().len(), 1);

        host.fail_listing(true);
        assert!(host.mounted_volumes().await.is_err());
        assert_eq!(host.listing_calls(), 2);
    }
}
