//! jockey keeps network shares mounted.
//!
//! A [`scheduler::ReconciliationScheduler`] periodically asks the
//! [`engine::Engine`] to detect which configured shares are reachable and
//! to remount the ones that dropped, recording every attempt in a bounded
//! reconnection log.

pub mod config;
pub mod detect;
pub mod engine;
pub mod logging;
pub mod mount;
pub mod reconnect_log;
pub mod scheduler;
pub mod share;
pub mod store;
