//! Mounting through the file manager's automation interface.
//!
//! The automation utility can exit 0 even when the mount request failed
//! inside the script, so success also requires the script to print `true`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use super::process::{run_tool, tool_name};
use super::{MountError, MountMechanism, MountResult, DEFAULT_TOOL_TIMEOUT};

pub const DEFAULT_AUTOMATION_TOOL: &str = "/usr/bin/osascript";

/// Asks Finder to `mount volume` the locator via AppleScript on stdin.
#[derive(Debug, Clone)]
pub struct FinderMount {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl FinderMount {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Arguments passed to the automation utility before it reads stdin.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the AppleScript that requests the mount and reports the outcome.
    pub fn build_script(locator: &Url) -> String {
        let escaped = locator.as_str().replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            r#"tell application "Finder"
    try
        mount volume "{}"
        return true
    on error errMessage
        return false
    end try
end tell
"#,
            escaped
        )
    }
}

impl Default for FinderMount {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOMATION_TOOL)
    }
}

#[async_trait]
impl MountMechanism for FinderMount {
    fn name(&self) -> &'static str {
        "finder"
    }

    fn display_name(&self) -> &'static str {
        "Finder automation"
    }

    async fn mount(&self, locator: &Url, mount_path: &Path) -> MountResult<String> {
        info!(url = %locator, "Trying Finder automation mount");

        let script = Self::build_script(locator);
        let output = run_tool(&self.program, &self.args, Some(&script), self.timeout).await?;
        let reply = output.stdout.trim();

        if output.success() && reply == "true" {
            info!(url = %locator, "Mounted with Finder automation");
            Ok(format!(
                "Mounted {} at {} with Finder automation",
                locator,
                mount_path.display()
            ))
        } else {
            warn!(
                status = %output.code_label(),
                output = %reply,
                "Finder automation mount failed"
            );
            Err(MountError::ScriptRejected {
                tool: tool_name(&self.program),
                status: output.code_label(),
                output: reply.to_string(),
            })
        }
    }
}
