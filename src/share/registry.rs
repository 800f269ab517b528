//! Registry of configured shares.
//!
//! The registry owns the share list of one process. It persists itself to the
//! key/value store after every mutation; a failed write is logged and the
//! in-memory list stays in use. Several processes may share one store, so
//! callers [`reload`](ShareRegistry::reload) before acting on the list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use url::Url;

use super::error::{ShareError, ShareResult};
use super::types::{system_mount_path, Share, ShareId};
use crate::store::{load_json, save_json, KeyValueStore, KEY_CONFIGURED_SHARES};

/// Ordered collection of configured shares.
pub struct ShareRegistry {
    shares: Vec<Share>,
    store: Arc<dyn KeyValueStore>,
    mount_root: PathBuf,
}

impl ShareRegistry {
    /// Create an empty registry that persists into `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, mount_root: impl Into<PathBuf>) -> Self {
        Self {
            shares: Vec::new(),
            store,
            mount_root: mount_root.into(),
        }
    }

    /// Load the persisted share list. An undecodable list starts the registry empty.
    pub fn load(store: Arc<dyn KeyValueStore>, mount_root: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new(store, mount_root);
        if let Some(shares) = registry.load_stored() {
            debug!(count = shares.len(), "Loaded configured shares");
            registry.shares = shares;
        }
        registry
    }

    /// Root directory used to derive default mount points.
    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    pub fn set_mount_root(&mut self, root: impl Into<PathBuf>) {
        self.mount_root = root.into();
    }

    /// Add a share. Fails if another share already uses the same locator.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        remote_address: Url,
        mount_point: Option<PathBuf>,
    ) -> ShareResult<Share> {
        if self.find_by_address(remote_address.as_str()).is_some() {
            info!(
                url = %remote_address,
                "Share with this URL already exists, not adding duplicate"
            );
            return Err(ShareError::duplicate(remote_address.as_str()));
        }

        let name = name.into();
        let mount_point = mount_point.or_else(|| Some(system_mount_path(&self.mount_root, &name)));
        let share = Share::new(name, remote_address, mount_point);

        info!(share = %share.name, url = %share.remote_address, "Share added");
        self.shares.push(share.clone());
        self.persist();
        Ok(share)
    }

    /// Remove a share by ID. Returns false if it was not registered.
    pub fn remove(&mut self, id: ShareId) -> bool {
        let before = self.shares.len();
        self.shares.retain(|s| s.id != id);

        if self.shares.len() == before {
            return false;
        }

        info!(share_id = %id, "Share removed");
        self.persist();
        true
    }

    /// Replace the share with the same ID. Unknown IDs are ignored.
    pub fn update(&mut self, share: Share) -> ShareResult<()> {
        if self
            .shares
            .iter()
            .any(|s| s.id != share.id && s.remote_address.as_str() == share.remote_address.as_str())
        {
            return Err(ShareError::duplicate(share.remote_address.as_str()));
        }

        if let Some(slot) = self.shares.iter_mut().find(|s| s.id == share.id) {
            *slot = share;
            self.persist();
        }
        Ok(())
    }

    /// Shares in insertion order.
    pub fn list(&self) -> &[Share] {
        &self.shares
    }

    pub fn get(&self, id: ShareId) -> Option<&Share> {
        self.shares.iter().find(|s| s.id == id)
    }

    /// Find a share by exact locator string.
    pub fn find_by_address(&self, address: &str) -> Option<&Share> {
        self.shares
            .iter()
            .find(|s| s.remote_address.as_str() == address)
    }

    /// Replace the whole list, persisting once.
    pub fn set_all(&mut self, shares: Vec<Share>) {
        self.shares = shares;
        self.persist();
    }

    /// Pick up changes another process made to the persisted list.
    ///
    /// The stored list decides which shares exist, their order and their
    /// configuration. Connection state is taken from whichever copy was
    /// checked more recently. An absent or undecodable list keeps the
    /// in-memory one.
    pub fn reload(&mut self) {
        let Some(stored) = self.load_stored() else {
            return;
        };

        let previous = std::mem::take(&mut self.shares);
        self.shares = stored
            .into_iter()
            .map(|mut share| {
                if let Some(known) = previous.iter().find(|s| s.id == share.id) {
                    if known.last_checked > share.last_checked {
                        share.adopt_status(known);
                    }
                }
                share
            })
            .collect();
    }

    /// Store the result of a detection pass.
    ///
    /// Shares added to the store while the pass ran are kept, and shares
    /// removed from it meanwhile are not written back.
    pub fn merge_detected(&mut self, detected: Vec<Share>) {
        self.shares = match self.load_stored() {
            Some(stored) => stored
                .into_iter()
                .map(|share| {
                    detected
                        .iter()
                        .find(|s| s.id == share.id)
                        .cloned()
                        .unwrap_or(share)
                })
                .collect(),
            None => detected,
        };
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    fn load_stored(&self) -> Option<Vec<Share>> {
        match load_json::<Vec<Share>>(self.store.as_ref(), KEY_CONFIGURED_SHARES) {
            Ok(Some(mut shares)) => {
                for share in &mut shares {
                    share.enforce_invariants();
                }
                Some(shares)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable configured shares");
                None
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = save_json(self.store.as_ref(), KEY_CONFIGURED_SHARES, &self.shares) {
            error!(error = %e, "Failed to save configured shares");
        }
    }
}
