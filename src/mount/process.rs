//! Bounded execution of external helper utilities.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::MountError;

/// Captured result of a helper process that ran to completion.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code as text, or `signal` if the process was killed.
    pub fn code_label(&self) -> String {
        match self.status.code() {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }

    /// Trimmed stderr, falling back to trimmed stdout.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Run `program` with `args`, optionally feeding `stdin`, and wait at most `timeout`.
///
/// The child is killed if the timeout elapses.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<ToolOutput, MountError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| MountError::launch(&tool, source))?;

    let input = stdin.map(str::to_owned);
    let mut pipe = child.stdin.take();

    let run = async move {
        if let (Some(input), Some(pipe)) = (input, pipe.as_mut()) {
            // The helper may exit without reading; that surfaces in its status.
            if let Err(e) = pipe.write_all(input.as_bytes()).await {
                debug!(error = %e, "Helper closed stdin early");
            }
        }
        drop(pipe);
        child.wait_with_output().await
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => Ok(ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(source)) => Err(MountError::launch(&tool, source)),
        Err(_) => Err(MountError::Timeout {
            tool,
            after: timeout,
        }),
    }
}

/// Short name of a helper for messages (`/sbin/mount_smbfs` -> `mount_smbfs`).
pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| program.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_run_tool_success() {
        let output = run_tool(Path::new("sh"), ["-c", "echo hello"], None, TIMEOUT)
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_tool_nonzero_exit() {
        let output = run_tool(Path::new("sh"), ["-c", "echo nope >&2; exit 3"], None, TIMEOUT)
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.code_label(), "3");
        assert_eq!(output.diagnostic(), "nope");
    }

    #[tokio::test]
    async fn test_run_tool_feeds_stdin() {
        let output = run_tool(Path::new("cat"), Vec::<String>::new(), Some("script body"), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.stdout, "script body");
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let err = run_tool(
            Path::new("/definitely/not/a/real/binary_12345"),
            Vec::<String>::new(),
            None,
            TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MountError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_run_tool_timeout() {
        let start = std::time::Instant::now();
        let err = run_tool(
            Path::new("sleep"),
            ["10"],
            None,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MountError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_tool_name() {
        assert_eq!(tool_name(&PathBuf::from("/sbin/mount_smbfs")), "mount_smbfs");
        assert_eq!(tool_name(&PathBuf::from("osascript")), "osascript");
    }
}
