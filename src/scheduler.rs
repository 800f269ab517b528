//! Periodic reconciliation.
//!
//! One tokio task ticks at the polling interval and runs a full
//! reconciliation pass per tick. The first tick fires immediately, so a
//! pass also runs right after `start` and after every interval change.
//! A period persisted by another process is adopted after the next pass.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::Engine;
use crate::store::StoreResult;

/// Polling period in whole seconds, always within 5..=300.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollingInterval(u64);

impl PollingInterval {
    pub const MIN_SECS: u64 = 5;
    pub const MAX_SECS: u64 = 300;
    pub const DEFAULT_SECS: u64 = 30;

    /// Clamp a requested period into the accepted range.
    pub fn clamped(secs: f64) -> Self {
        if secs.is_nan() {
            return Self::default();
        }
        let secs = secs.round().clamp(Self::MIN_SECS as f64, Self::MAX_SECS as f64);
        Self(secs as u64)
    }

    /// Interpret a persisted value. Non-positive values mean "use the default".
    pub fn from_stored(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            Self::default()
        } else {
            Self::clamped(secs)
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for PollingInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_SECS)
    }
}

impl std::fmt::Display for PollingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Owns the single repeating reconciliation task.
pub struct ReconciliationScheduler {
    engine: Engine,
    task: Option<JoinHandle<()>>,
    interval: Arc<AtomicU64>,
}

impl ReconciliationScheduler {
    /// Create a stopped scheduler using the engine's stored interval.
    pub fn new(engine: Engine) -> Self {
        let interval = engine.snapshot().polling_interval;
        Self {
            engine,
            task: None,
            interval: Arc::new(AtomicU64::new(interval.as_secs())),
        }
    }

    /// Period the timer currently ticks at.
    pub fn interval(&self) -> PollingInterval {
        PollingInterval(self.interval.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start ticking at `interval`, replacing any running task.
    pub fn start(&mut self, interval: PollingInterval) {
        self.stop();
        self.interval.store(interval.as_secs(), Ordering::Relaxed);
        info!(interval = %interval, "Starting reconciliation timer");
        self.task = Some(tokio::spawn(run_loop(
            self.engine.clone(),
            interval,
            self.interval.clone(),
        )));
    }

    /// Persist a new period and restart the timer with it.
    ///
    /// Any in-flight pass is aborted; the restarted task runs a new pass
    /// immediately.
    pub async fn set_interval(&mut self, interval: PollingInterval) -> StoreResult<()> {
        self.engine.set_polling_interval(interval).await?;
        self.start(interval);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Stopping reconciliation timer");
            task.abort();
        }
    }
}

impl Drop for ReconciliationScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn new_ticker(interval: PollingInterval) -> Interval {
    let mut ticker = tokio::time::interval(interval.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_loop(engine: Engine, interval: PollingInterval, current: Arc<AtomicU64>) {
    let mut stored = engine.snapshot().polling_interval;
    let mut ticker = new_ticker(interval);
    loop {
        ticker.tick().await;
        engine.reconcile().await;

        // Each pass republishes the stored period; a change means someone
        // else set it
        let latest = engine.snapshot().polling_interval;
        if latest != stored {
            info!(interval = %latest, "Polling interval changed in store, restarting timer");
            stored = latest;
            current.store(latest.as_secs(), Ordering::Relaxed);
            ticker = new_ticker(latest);
        }
    }
}
