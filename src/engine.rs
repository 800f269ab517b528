//! Reconciliation engine
//!
//! The engine owns the share registry and the reconnection log behind one
//! async mutex. Every pass and every user edit takes that lock, so passes
//! never overlap and edits never land in the middle of a pass. After each
//! pass or mutation a fresh [`EngineSnapshot`] is published on a watch
//! channel for whatever presentation layer is attached.
//!
//! Other processes (a second `jockey` invocation, say) may write to the same
//! store. The engine reloads persisted state under the lock before every
//! pass and mutation, so it never writes back a stale share list or log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::detect::{self, MountDetector};
use crate::mount::{AttemptOutcome, MountError, MountOrchestrator};
use crate::reconnect_log::{ReconnectionLog, ReconnectionLogEntry};
use crate::scheduler::PollingInterval;
use crate::share::{Share, ShareError, ShareId, ShareRegistry, ShareResult};
use crate::store::{KeyValueStore, Settings, StoreResult};

/// Delays of the confirmation re-checks that follow a mount attempt.
pub const DEFAULT_RECHECK_DELAYS: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(3)];

/// Read-only view of engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub shares: Vec<Share>,
    /// Log entries in insertion order.
    pub logs: Vec<ReconnectionLogEntry>,
    pub polling_interval: PollingInterval,
    pub mount_root: PathBuf,
}

struct EngineState {
    registry: ShareRegistry,
    log: ReconnectionLog,
}

struct EngineInner {
    state: Mutex<EngineState>,
    detector: MountDetector,
    orchestrator: MountOrchestrator,
    settings: Settings,
    snapshot: watch::Sender<EngineSnapshot>,
    recheck_delays: Vec<Duration>,
}

/// Handle to the reconciliation engine. Clones share the same state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Load persisted state from `store` and build an engine around it.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        detector: MountDetector,
        orchestrator: MountOrchestrator,
    ) -> Self {
        Self::with_recheck_delays(store, detector, orchestrator, DEFAULT_RECHECK_DELAYS.to_vec())
    }

    /// Like [`Engine::new`] with custom confirmation re-check delays.
    /// An empty list disables re-checks.
    pub fn with_recheck_delays(
        store: Arc<dyn KeyValueStore>,
        detector: MountDetector,
        orchestrator: MountOrchestrator,
        recheck_delays: Vec<Duration>,
    ) -> Self {
        let settings = Settings::new(store.clone());
        let mount_root = settings.default_mount_path();
        let registry = ShareRegistry::load(store.clone(), mount_root);
        let log = ReconnectionLog::load(store);

        let state = EngineState { registry, log };
        let initial = build_snapshot(&state, settings.polling_interval());
        let (snapshot, _) = watch::channel(initial);

        info!(
            shares = state.registry.len(),
            logs = state.log.len(),
            "Engine state loaded"
        );

        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                detector,
                orchestrator,
                settings,
                snapshot,
                recheck_delays,
            }),
        }
    }

    /// Receive a new snapshot after every pass or mutation.
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn detector(&self) -> &MountDetector {
        &self.inner.detector
    }

    pub fn orchestrator(&self) -> &MountOrchestrator {
        &self.inner.orchestrator
    }

    /// Refresh connection state of every share without mounting anything.
    pub async fn detect_pass(&self) -> Vec<Share> {
        let mut state = self.inner.state.lock().await;
        self.sync_locked(&mut state);
        self.detect_locked(&mut state).await;
        self.publish(&state);
        state.registry.list().to_vec()
    }

    /// One full reconciliation pass.
    ///
    /// Detection completes for every share before any mount is attempted.
    /// Disconnected shares are then attempted one at a time in registry
    /// order. Returns the outcomes of the attempts that ran.
    pub async fn reconcile(&self) -> Vec<AttemptOutcome> {
        let outcomes = {
            let mut state = self.inner.state.lock().await;
            self.sync_locked(&mut state);
            self.detect_locked(&mut state).await;

            let root = state.registry.mount_root().to_path_buf();
            let disconnected: Vec<Share> = state
                .registry
                .list()
                .iter()
                .filter(|s| !s.is_connected)
                .cloned()
                .collect();

            if !disconnected.is_empty() {
                info!(
                    "Attempting to reconnect {} disconnected shares",
                    disconnected.len()
                );
            }

            let mut outcomes = Vec::new();
            for share in &disconnected {
                match self.inner.orchestrator.attempt(share, &root).await {
                    Ok(outcome) => {
                        record(&mut state, &outcome);
                        outcomes.push(outcome);
                    }
                    Err(e) => warn!(share = %share.name, error = %e, "Skipping share"),
                }
            }

            self.publish(&state);
            outcomes
        };

        if !outcomes.is_empty() {
            self.schedule_rechecks();
        }
        outcomes
    }

    /// Attempt to mount one share now, whatever its current state.
    pub async fn mount_share(&self, id: ShareId) -> ShareResult<AttemptOutcome> {
        let outcome = {
            let mut state = self.inner.state.lock().await;
            self.sync_locked(&mut state);
            let share = state
                .registry
                .get(id)
                .cloned()
                .ok_or(ShareError::NotFound(id))?;
            let root = state.registry.mount_root().to_path_buf();

            let outcome = self.inner.orchestrator.attempt(&share, &root).await?;
            record(&mut state, &outcome);
            self.detect_locked(&mut state).await;
            self.publish(&state);
            outcome
        };

        self.schedule_rechecks();
        Ok(outcome)
    }

    /// Unmount one share and re-detect. `Ok(false)` when there was nothing to unmount.
    pub async fn unmount_share(&self, id: ShareId) -> Result<bool, EngineError> {
        let mut state = self.inner.state.lock().await;
        self.sync_locked(&mut state);
        let share = state
            .registry
            .get(id)
            .cloned()
            .ok_or(ShareError::NotFound(id))?;

        let unmounted = self.inner.orchestrator.unmount(&share).await?;
        if unmounted {
            self.detect_locked(&mut state).await;
            self.publish(&state);
        }
        Ok(unmounted)
    }

    pub async fn add_share(
        &self,
        name: impl Into<String>,
        remote_address: Url,
        mount_point: Option<PathBuf>,
    ) -> ShareResult<Share> {
        let mut state = self.inner.state.lock().await;
        self.sync_locked(&mut state);
        let share = state.registry.add(name, remote_address, mount_point)?;
        self.publish(&state);
        Ok(share)
    }

    /// Remove a share. Returns whether it existed.
    pub async fn remove_share(&self, id: ShareId) -> bool {
        let mut state = self.inner.state.lock().await;
        self.sync_locked(&mut state);
        let removed = state.registry.remove(id);
        self.publish(&state);
        removed
    }

    pub async fn update_share(&self, share: Share) -> ShareResult<()> {
        let mut state = self.inner.state.lock().await;
        self.sync_locked(&mut state);
        state.registry.update(share)?;
        self.publish(&state);
        Ok(())
    }

    /// Persist a new polling interval. Restarting the timer is the scheduler's job.
    pub async fn set_polling_interval(&self, interval: PollingInterval) -> StoreResult<()> {
        let mut state = self.inner.state.lock().await;
        self.inner.settings.set_polling_interval(interval)?;
        self.sync_locked(&mut state);
        self.publish(&state);
        Ok(())
    }

    /// Persist a new root for default mount points.
    pub async fn set_default_mount_path(&self, path: &Path) -> StoreResult<()> {
        let mut state = self.inner.state.lock().await;
        self.inner.settings.set_default_mount_path(path)?;
        self.sync_locked(&mut state);
        self.publish(&state);
        Ok(())
    }

    pub async fn clear_logs(&self) {
        let mut state = self.inner.state.lock().await;
        self.sync_locked(&mut state);
        state.log.clear();
        self.publish(&state);
    }

    /// Network shares currently mounted on the host, keyed by volume name.
    pub async fn discover_system_shares(&self) -> BTreeMap<String, Url> {
        match self.inner.detector.host().mounted_volumes().await {
            Ok(volumes) => detect::discover_system_shares(&volumes),
            Err(e) => {
                warn!(error = %e, "Could not list system shares");
                BTreeMap::new()
            }
        }
    }

    /// Where the host has mounted a share called `share_name`, if anywhere.
    pub async fn locate_mount_point(&self, share_name: &str) -> Option<PathBuf> {
        match self.inner.detector.host().mounted_volumes().await {
            Ok(volumes) => detect::locate_mount_point(&volumes, share_name),
            Err(e) => {
                warn!(error = %e, "Could not list mounted volumes");
                None
            }
        }
    }

    /// Reload everything another process may have persisted.
    fn sync_locked(&self, state: &mut EngineState) {
        state.registry.reload();
        state
            .registry
            .set_mount_root(self.inner.settings.default_mount_path());
        state.log.reload();
    }

    async fn detect_locked(&self, state: &mut EngineState) {
        let root = state.registry.mount_root().to_path_buf();
        let shares = state.registry.list().to_vec();
        let refreshed = self.inner.detector.refresh(shares, &root, Utc::now()).await;
        state.registry.merge_detected(refreshed);
    }

    fn publish(&self, state: &EngineState) {
        self.inner
            .snapshot
            .send_replace(build_snapshot(state, self.inner.settings.polling_interval()));
    }

    fn schedule_rechecks(&self) {
        for delay in self.inner.recheck_delays.iter().copied() {
            let engine = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                debug!(?delay, "Confirmation re-check");
                engine.detect_pass().await;
            });
        }
    }
}

/// Append an attempt on top of whatever other writers logged meanwhile.
fn record(state: &mut EngineState, outcome: &AttemptOutcome) {
    state.log.reload();
    state.log.append(outcome.entry.clone());
}

fn build_snapshot(state: &EngineState, polling_interval: PollingInterval) -> EngineSnapshot {
    EngineSnapshot {
        shares: state.registry.list().to_vec(),
        logs: state.log.list().to_vec(),
        polling_interval,
        mount_root: state.registry.mount_root().to_path_buf(),
    }
}

/// Errors from user-initiated engine operations that touch the host.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Mount(#[from] MountError),
}
