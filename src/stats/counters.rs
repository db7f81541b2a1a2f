//! Atomic dispatch counters.
//!
//! Submission tasks finish on the runtime's worker threads, so the counters
//! are atomics behind an `Arc` rather than plain fields on the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one watcher process.
#[derive(Debug)]
pub struct DispatchStats {
    /// Editor notifications received
    events_received: AtomicU64,
    /// Heartbeats handed to the store
    heartbeats_dispatched: AtomicU64,
    /// Heartbeats held back by the rate limiter
    suppressed: AtomicU64,
    /// Notifications dropped because the bucket was not ready
    dropped_not_ready: AtomicU64,
    /// Notifications that could not be resolved to a file/project
    resolution_failures: AtomicU64,
    /// Submissions the store accepted
    submissions_ok: AtomicU64,
    /// Submissions that failed
    submission_failures: AtomicU64,
    /// When the process started counting
    started_at: DateTime<Utc>,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            heartbeats_dispatched: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            dropped_not_ready: AtomicU64::new(0),
            resolution_failures: AtomicU64::new(0),
            submissions_ok: AtomicU64::new(0),
            submission_failures: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.heartbeats_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_not_ready(&self) {
        self.dropped_not_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution_failure(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission_ok(&self) {
        self.submissions_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission_failure(&self) {
        self.submission_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            heartbeats_dispatched: self.heartbeats_dispatched.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            dropped_not_ready: self.dropped_not_ready.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
            submissions_ok: self.submissions_ok.load(Ordering::Relaxed),
            submission_failures: self.submission_failures.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Watcher Statistics:\n\
             - Editor events received: {}\n\
             - Heartbeats dispatched: {}\n\
             - Suppressed by rate limit: {}\n\
             - Dropped while bucket not ready: {}\n\
             - Resolution failures: {}\n\
             - Submissions ok / failed: {} / {}\n\
             - Uptime: {} seconds",
            stats.events_received,
            stats.heartbeats_dispatched,
            stats.suppressed,
            stats.dropped_not_ready,
            stats.resolution_failures,
            stats.submissions_ok,
            stats.submission_failures,
            stats.uptime_secs
        )
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_received: u64,
    pub heartbeats_dispatched: u64,
    pub suppressed: u64,
    pub dropped_not_ready: u64,
    pub resolution_failures: u64,
    pub submissions_ok: u64,
    pub submission_failures: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared counters.
pub type SharedDispatchStats = Arc<DispatchStats>;

pub fn create_shared_stats() -> SharedDispatchStats {
    Arc::new(DispatchStats::new())
}
