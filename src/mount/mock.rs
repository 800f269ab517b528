//! Mock mount mechanism for testing.
//!
//! Provides a configurable implementation of `MountMechanism` that records
//! its calls and returns a scripted outcome without spawning subprocesses.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{MountError, MountMechanism, MountResult};

/// Scripted outcome of a mock mount.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Report success.
    Succeed,
    /// Report a non-zero exit with the given output.
    ExitStatus(i32, String),
    /// Simulate the helper binary being missing.
    LaunchFailure,
    /// Simulate the helper hanging past its timeout.
    Timeout,
}

/// Configuration for mock mechanism behavior.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Name reported by the mechanism.
    pub name: &'static str,
    /// Outcome returned by every call.
    pub outcome: MockOutcome,
    /// Simulated duration of the helper.
    pub delay: Option<Duration>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock",
            outcome: MockOutcome::Succeed,
            delay: None,
        }
    }
}

impl MockConfig {
    /// A mechanism that always succeeds.
    pub fn succeeding(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// A mechanism that always exits with `code`.
    pub fn failing(name: &'static str, code: i32) -> Self {
        Self {
            name,
            outcome: MockOutcome::ExitStatus(code, format!("{} refused", name)),
            ..Default::default()
        }
    }

    /// A mechanism whose binary cannot be started.
    pub fn unlaunchable(name: &'static str) -> Self {
        Self {
            name,
            outcome: MockOutcome::LaunchFailure,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Mock mount mechanism for testing.
///
/// Clones share the same call record, so a test can keep one handle and hand
/// another to the orchestrator.
#[derive(Debug, Clone)]
pub struct MockMechanism {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl MockMechanism {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `(locator, mount path)` of every call so far.
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MountMechanism for MockMechanism {
    fn name(&self) -> &'static str {
        self.config.name
    }

    async fn mount(&self, locator: &Url, mount_path: &Path) -> MountResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((locator.to_string(), mount_path.to_path_buf()));
        }

        if let Some(delay) = self.config.delay {
            tokio::time::sleep(delay).await;
        }

        let tool = self.config.name.to_string();
        match &self.config.outcome {
            MockOutcome::Succeed => Ok(format!(
                "Mounted {} at {} with {}",
                locator,
                mount_path.display(),
                self.config.name
            )),
            MockOutcome::ExitStatus(code, output) => Err(MountError::ExitStatus {
                tool,
                status: code.to_string(),
                output: output.clone(),
            }),
            MockOutcome::LaunchFailure => Err(MountError::launch(
                tool,
                io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
            )),
            MockOutcome::Timeout => Err(MountError::Timeout {
                tool,
                after: self.config.delay.unwrap_or_default(),
            }),
        }
    }
}
