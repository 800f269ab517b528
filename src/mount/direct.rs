//! Direct invocation of the OS mount and unmount utilities.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use super::process::{run_tool, tool_name};
use super::{MountError, MountMechanism, MountResult, DEFAULT_TOOL_TIMEOUT};

pub const DEFAULT_MOUNT_TOOL: &str = "/sbin/mount_smbfs";
pub const DEFAULT_UNMOUNT_TOOL: &str = "/sbin/umount";

/// Mounts by running `<tool> [extra args] <locator> <mount path>`.
///
/// Success is exit status zero.
#[derive(Debug, Clone)]
pub struct DirectMount {
    program: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl DirectMount {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Arguments placed before the locator (e.g. `-t cifs`).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for DirectMount {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_TOOL)
    }
}

#[async_trait]
impl MountMechanism for DirectMount {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn display_name(&self) -> &'static str {
        "mount utility"
    }

    async fn mount(&self, locator: &Url, mount_path: &Path) -> MountResult<String> {
        let mut args: Vec<String> = self.extra_args.clone();
        args.push(locator.as_str().to_string());
        args.push(mount_path.to_string_lossy().into_owned());

        let output = run_tool(&self.program, &args, None, self.timeout).await?;
        let tool = tool_name(&self.program);

        if output.success() {
            info!(url = %locator, path = %mount_path.display(), "Mounted with {}", tool);
            Ok(format!(
                "Mounted {} at {} with {}",
                locator,
                mount_path.display(),
                tool
            ))
        } else {
            warn!(status = %output.code_label(), "{} failed", tool);
            Err(MountError::ExitStatus {
                tool,
                status: output.code_label(),
                output: output.diagnostic(),
            })
        }
    }
}

/// Detaches a mount path with the OS unmount utility.
#[derive(Debug, Clone)]
pub struct UnmountTool {
    program: PathBuf,
    timeout: Duration,
}

impl UnmountTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `<tool> <mount path>`; success is exit status zero.
    pub async fn unmount(&self, mount_path: &Path) -> MountResult<()> {
        let output = run_tool(&self.program, [mount_path.as_os_str()], None, self.timeout).await?;
        if output.success() {
            Ok(())
        } else {
            Err(MountError::ExitStatus {
                tool: tool_name(&self.program),
                status: output.code_label(),
                output: output.diagnostic(),
            })
        }
    }
}

impl Default for UnmountTool {
    fn default() -> Self {
        Self::new(DEFAULT_UNMOUNT_TOOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> Url {
        Url::parse("smb://user@nas.local/Media").unwrap()
    }

    #[test]
    fn test_direct_defaults() {
        let mechanism = DirectMount::default();
        assert_eq!(mechanism.program(), Path::new("/sbin/mount_smbfs"));
        assert_eq!(mechanism.name(), "direct");
    }

    #[tokio::test]
    async fn test_direct_success_on_zero_exit() {
        let mechanism = DirectMount::new("true");
        let message = mechanism
            .mount(&locator(), Path::new("/Volumes/Media"))
            .await
            .unwrap();
        assert!(message.contains("smb://user@nas.local/Media"));
        assert!(message.contains("/Volumes/Media"));
    }

    #[tokio::test]
    async fn test_direct_failure_on_nonzero_exit() {
        let mechanism = DirectMount::new("false");
        let err = mechanism
            .mount(&locator(), Path::new("/Volumes/Media"))
            .await
            .unwrap_err();
        match err {
            MountError::ExitStatus { tool, status, .. } => {
                assert_eq!(tool, "false");
                assert_eq!(status, "1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_direct_passes_locator_and_path() {
        // sh -c '<script>' <$0> <$1> ...: exit 0 only if the arguments line up
        let mechanism = DirectMount::new("sh").with_args(vec![
            "-c".to_string(),
            r#"[ "$0" = "smb://user@nas.local/Media" ] && [ "$1" = "/Volumes/Media" ]"#.to_string(),
        ]);
        assert!(mechanism
            .mount(&locator(), Path::new("/Volumes/Media"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_direct_missing_binary_is_launch_failure() {
        let mechanism = DirectMount::new("/no/such/mount_tool_12345");
        let err = mechanism
            .mount(&locator(), Path::new("/Volumes/Media"))
            .await
            .unwrap_err();
        assert!(matches!(err, MountError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_unmount_exit_status() {
        assert!(UnmountTool::new("true")
            .unmount(Path::new("/Volumes/Media"))
            .await
            .is_ok());
        assert!(UnmountTool::new("false")
            .unmount(Path::new("/Volumes/Media"))
            .await
            .is_err());
    }
}
