//! Mount mechanisms and the orchestrator that chains them
//!
//! A mechanism is one concrete way of asking the OS to attach a share: calling
//! the mount utility directly, or asking the file manager to do it through its
//! automation interface. The orchestrator tries them in priority order and
//! stops at the first success.

use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

mod direct;
mod finder;
pub mod mock;
mod orchestrator;
pub mod process;

pub use direct::{DirectMount, UnmountTool, DEFAULT_MOUNT_TOOL, DEFAULT_UNMOUNT_TOOL};
pub use finder::{FinderMount, DEFAULT_AUTOMATION_TOOL};
pub use orchestrator::{AttemptOutcome, MountOrchestrator};

/// Default upper bound for a single helper invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Error types for mount operations
#[derive(Debug, Error)]
pub enum MountError {
    /// The helper could not be started at all.
    #[error("{tool} could not be started: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The helper ran and exited non-zero.
    #[error("{tool} failed with status {status}: {output}")]
    ExitStatus {
        tool: String,
        status: String,
        output: String,
    },

    /// The automation script ran but did not report success.
    #[error("{tool} mount failed with status {status}, output: {output}")]
    ScriptRejected {
        tool: String,
        status: String,
        output: String,
    },

    /// The helper did not finish in time and was killed.
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },
}

impl MountError {
    pub fn launch(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            tool: tool.into(),
            source,
        }
    }
}

/// Result type for mount operations
pub type MountResult<T> = Result<T, MountError>;

/// One way of mounting a share.
///
/// Mechanisms are pass/fail: `Ok` carries a human-readable success message,
/// `Err` describes why this mechanism did not mount the share.
#[async_trait]
pub trait MountMechanism: Send + Sync {
    /// Get the name of this mechanism
    fn name(&self) -> &'static str;

    /// Get the display name for user-facing output
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Attach `locator` at `mount_path`.
    async fn mount(&self, locator: &Url, mount_path: &Path) -> MountResult<String>;
}
