//! Mount detection
//!
//! Decides for each share whether it is currently reachable. Probes run in a
//! fixed order and the first match wins:
//!
//! 1. the OS-standard mount directory for the share's name (and, if found,
//!    the stored mount point is rewritten to it),
//! 2. the share's configured mount point,
//! 3. the list of mounted network volumes, matched by host, then remote
//!    path, then volume name.
//!
//! Volume matching is by substring, so a short host or path can match an
//! unrelated volume; the first matching volume wins.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::share::{system_mount_path, Share};

pub mod host;
pub mod mount_table;

pub use host::{
    find_listing_tool, HostProbe, StaticHost, SystemHost, DEFAULT_LISTING_TIMEOUT,
};
pub use mount_table::{
    discover_system_shares, locate_mount_point, parse_mount_line, parse_mount_table,
    MountedVolume, DEFAULT_NETWORK_MARKER,
};

/// Which property of a mounted volume matched a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMatch {
    Host,
    Path,
    Name,
}

/// How a share was found, or that it was not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Mounted at the OS-standard directory for its name.
    SystemPath,
    /// Mounted at its configured mount point.
    MountPoint,
    /// Found in the mounted network volume list.
    Volume { locator: String, reason: VolumeMatch },
    NotFound,
}

impl Detection {
    pub fn is_connected(&self) -> bool {
        !matches!(self, Detection::NotFound)
    }
}

/// Refreshes share connection state from the host.
#[derive(Clone)]
pub struct MountDetector {
    host: Arc<dyn HostProbe>,
}

impl MountDetector {
    pub fn new(host: Arc<dyn HostProbe>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<dyn HostProbe> {
        &self.host
    }

    /// Run one detection pass over `shares` and return the updated snapshot.
    ///
    /// The volume list is fetched at most once per pass, and only if some
    /// share falls through to it.
    pub async fn refresh(
        &self,
        mut shares: Vec<Share>,
        mount_root: &Path,
        now: DateTime<Utc>,
    ) -> Vec<Share> {
        info!("Checking connection status for {} shares", shares.len());

        let mut volumes = None;
        for share in &mut shares {
            self.detect(share, mount_root, now, &mut volumes).await;
        }
        shares
    }

    /// Detect one share and apply the resulting transition.
    ///
    /// `volumes` caches the mounted-volume list across calls within a pass.
    pub async fn detect(
        &self,
        share: &mut Share,
        mount_root: &Path,
        now: DateTime<Utc>,
        volumes: &mut Option<Vec<MountedVolume>>,
    ) -> Detection {
        debug!(share = %share.name, url = %share.remote_address, "Checking share");
        share.last_checked = Some(now);

        let detection = self.probe(share, mount_root, volumes).await;

        if detection.is_connected() {
            if share.mark_connected(now) {
                info!(share = %share.name, via = ?detection, "Share is now connected");
            } else {
                debug!(share = %share.name, "Share connection status unchanged: connected");
            }
        } else if share.mark_disconnected() {
            info!(share = %share.name, "Share is now disconnected");
        } else {
            debug!(share = %share.name, "Share connection status unchanged: disconnected");
        }

        detection
    }

    async fn probe(
        &self,
        share: &mut Share,
        mount_root: &Path,
        volumes: &mut Option<Vec<MountedVolume>>,
    ) -> Detection {
        let system_path = system_mount_path(mount_root, &share.name);
        if self.host.path_is_mounted(&system_path).await {
            debug!(path = %system_path.display(), "Found at system default path");
            if share.mount_point.as_deref() != Some(system_path.as_path()) {
                info!(
                    share = %share.name,
                    path = %system_path.display(),
                    "Updated mount point to system default"
                );
                share.mount_point = Some(system_path);
            }
            return Detection::SystemPath;
        }

        if let Some(mount_point) = &share.mount_point {
            let exists = self.host.path_is_mounted(mount_point).await;
            debug!(path = %mount_point.display(), exists, "Mount point check");
            if exists {
                return Detection::MountPoint;
            }
        }

        if volumes.is_none() {
            let listed = match self.host.mounted_volumes().await {
                Ok(listed) => listed,
                Err(e) => {
                    warn!(error = %e, "Could not list mounted volumes");
                    Vec::new()
                }
            };
            *volumes = Some(listed);
        }

        match volumes.as_deref().and_then(|v| match_volume(share, v)) {
            Some((volume, reason)) => {
                debug!(volume = %volume.locator, ?reason, "Found in mounted volumes");
                Detection::Volume {
                    locator: volume.locator.clone(),
                    reason,
                }
            }
            None => Detection::NotFound,
        }
    }
}

/// First volume matching `share` by host, remote path or name, in that order.
///
/// A remote path of `/` counts as no path, so it never matches on its own.
pub fn match_volume<'a>(
    share: &Share,
    volumes: &'a [MountedVolume],
) -> Option<(&'a MountedVolume, VolumeMatch)> {
    let host = share.host().unwrap_or_default().to_lowercase();
    let path = share.remote_path().trim_end_matches('/').to_lowercase();
    let name = share.name.to_lowercase();

    volumes.iter().find_map(|volume| {
        let descriptor = volume.descriptor().to_lowercase();
        if !host.is_empty() && descriptor.contains(&host) {
            Some((volume, VolumeMatch::Host))
        } else if !path.is_empty() && descriptor.contains(&path) {
            Some((volume, VolumeMatch::Path))
        } else if volume.name.to_lowercase() == name {
            Some((volume, VolumeMatch::Name))
        } else {
            None
        }
    })
}
