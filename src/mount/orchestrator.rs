//! Fallback chain of mount mechanisms.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{DirectMount, FinderMount, MountMechanism, MountResult, UnmountTool};
use crate::reconnect_log::ReconnectionLogEntry;
use crate::share::{Share, ShareError, ShareResult};

/// Result of one mount attempt for one share.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// The log entry describing the attempt.
    pub entry: ReconnectionLogEntry,
    /// Name of the mechanism that mounted the share, if any did.
    pub mechanism: Option<&'static str>,
}

impl AttemptOutcome {
    pub fn success(&self) -> bool {
        self.entry.success
    }
}

/// Tries each mechanism in order until one mounts the share.
pub struct MountOrchestrator {
    mechanisms: Vec<Box<dyn MountMechanism>>,
    unmounter: UnmountTool,
}

impl Default for MountOrchestrator {
    /// Mount utility first, Finder automation second.
    fn default() -> Self {
        Self::new(
            vec![
                Box::new(DirectMount::default()) as Box<dyn MountMechanism>,
                Box::new(FinderMount::default()),
            ],
            UnmountTool::default(),
        )
    }
}

impl MountOrchestrator {
    pub fn new(mechanisms: Vec<Box<dyn MountMechanism>>, unmounter: UnmountTool) -> Self {
        Self {
            mechanisms,
            unmounter,
        }
    }

    /// Names of the configured mechanisms, in priority order.
    pub fn mechanism_names(&self) -> Vec<&'static str> {
        self.mechanisms.iter().map(|m| m.name()).collect()
    }

    /// Attempt to mount `share`.
    ///
    /// Returns `MalformedShare` without trying anything when the locator has
    /// no host. Otherwise mechanisms run strictly one after another and the
    /// outcome carries exactly one log entry: the message of the mechanism
    /// that succeeded, or of the last one that failed.
    pub async fn attempt(&self, share: &Share, mount_root: &Path) -> ShareResult<AttemptOutcome> {
        if share.host().is_none() {
            warn!(share = %share.name, url = %share.remote_address, "Skipping share without host");
            return Err(ShareError::malformed(
                &share.name,
                share.remote_address.as_str(),
            ));
        }

        let mount_path = share.effective_mount_point(mount_root);
        let mut message = "no mount mechanisms configured".to_string();
        let mut winner = None;

        for mechanism in &self.mechanisms {
            debug!(share = %share.name, mechanism = mechanism.name(), "Trying mechanism");
            match mechanism.mount(&share.remote_address, &mount_path).await {
                Ok(success) => {
                    message = success;
                    winner = Some(mechanism.name());
                    break;
                }
                Err(e) => {
                    warn!(
                        share = %share.name,
                        mechanism = mechanism.name(),
                        error = %e,
                        "Mount mechanism failed"
                    );
                    message = format!("{}: {}", mechanism.display_name(), e);
                }
            }
        }

        if winner.is_some() {
            info!(share = %share.name, path = %mount_path.display(), "Share mounted");
        }

        let entry = ReconnectionLogEntry::new(
            Utc::now(),
            &share.name,
            share.remote_address.as_str(),
            mount_path.to_string_lossy(),
            winner.is_some(),
            message,
        );

        Ok(AttemptOutcome {
            entry,
            mechanism: winner,
        })
    }

    /// Unmount a connected share. Returns `Ok(false)` when there is nothing to do.
    pub async fn unmount(&self, share: &Share) -> MountResult<bool> {
        let mount_point = match (&share.mount_point, share.is_connected) {
            (Some(path), true) => path,
            _ => return Ok(false),
        };

        match self.unmounter.unmount(mount_point).await {
            Ok(()) => {
                info!(share = %share.name, path = %mount_point.display(), "Share unmounted");
                Ok(true)
            }
            Err(e) => {
                warn!(share = %share.name, error = %e, "Failed to unmount share");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for MountOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountOrchestrator")
            .field("mechanisms", &self.mechanism_names())
            .field("unmounter", &self.unmounter)
            .finish()
    }
}
