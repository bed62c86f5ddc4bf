//! Capture statistics.
//!
//! Counters are updated from every task without locking and read as a
//! snapshot for the shutdown summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one pipeline run.
#[derive(Debug)]
pub struct CaptureStats {
    /// Raw events read from sources
    events_received: AtomicU64,
    /// Raw events a claiming translator had to drop
    events_dropped: AtomicU64,
    /// Records pushed into the buffer
    records_buffered: AtomicU64,
    batches_committed: AtomicU64,
    records_committed: AtomicU64,
    commit_failures: AtomicU64,
    /// Records discarded along with a failed batch
    records_lost: AtomicU64,
    sources_opened: AtomicU64,
    sources_failed: AtomicU64,
    started_at: DateTime<Utc>,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            records_buffered: AtomicU64::new(0),
            batches_committed: AtomicU64::new(0),
            records_committed: AtomicU64::new(0),
            commit_failures: AtomicU64::new(0),
            records_lost: AtomicU64::new(0),
            sources_opened: AtomicU64::new(0),
            sources_failed: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_records_buffered(&self, count: u64) {
        self.records_buffered.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a successfully committed batch of `records` records.
    pub fn record_batch_committed(&self, records: u64) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.records_committed.fetch_add(records, Ordering::Relaxed);
    }

    /// Record a failed commit whose `records` records were discarded.
    pub fn record_commit_failed(&self, records: u64) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
        self.records_lost.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_source_opened(&self) {
        self.sources_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_failed(&self) {
        self.sources_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            records_buffered: self.records_buffered.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            records_committed: self.records_committed.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            records_lost: self.records_lost.load(Ordering::Relaxed),
            sources_opened: self.sources_opened.load(Ordering::Relaxed),
            sources_failed: self.sources_failed.load(Ordering::Relaxed),
            started_at: self.started_at,
            duration_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Capture Statistics:\n\
             - Sources opened: {} ({} unavailable)\n\
             - Raw events received: {}\n\
             - Raw events dropped: {}\n\
             - Records buffered: {}\n\
             - Records committed: {} in {} batches\n\
             - Failed commits: {} ({} records lost)\n\
             - Duration: {} seconds",
            stats.sources_opened,
            stats.sources_failed,
            stats.events_received,
            stats.events_dropped,
            stats.records_buffered,
            stats.records_committed,
            stats.batches_committed,
            stats.commit_failures,
            stats.records_lost,
            stats.duration_secs
        )
    }
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of capture statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_received: u64,
    pub events_dropped: u64,
    pub records_buffered: u64,
    pub batches_committed: u64,
    pub records_committed: u64,
    pub commit_failures: u64,
    pub records_lost: u64,
    pub sources_opened: u64,
    pub sources_failed: u64,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<CaptureStats>;

pub fn create_shared_stats() -> SharedStats {
    Arc::new(CaptureStats::new())
}
