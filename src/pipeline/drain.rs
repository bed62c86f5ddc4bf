//! Drain task: moves buffered records to the sink.
//!
//! The task wakes when a push brings the buffer to the threshold and on
//! every interval tick. A threshold wake-up drains only if the buffer still
//! holds at least `threshold` records; a tick drains whatever is there.
//! Batches are committed one at a time, so commit order is drain order.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::buffer::LockingBuffer;
use crate::error::CommitError;
use crate::record::{RecordBatch, StructuredRecord};
use crate::scheduler::SchedulerHandle;
use crate::sink::Sink;
use crate::stats::SharedStats;

/// Wake-up line from source loops to the drain task.
#[derive(Debug, Clone)]
pub struct DrainSignal {
    threshold: usize,
    wake: Arc<Notify>,
}

impl DrainSignal {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Called after a push that left `buffered` records in the buffer.
    pub fn pushed(&self, buffered: usize) {
        if buffered >= self.threshold {
            self.wake.notify_one();
        }
    }

    async fn woken(&self) {
        self.wake.notified().await;
    }
}

pub struct DrainTask {
    pub buffer: Arc<LockingBuffer<StructuredRecord>>,
    pub sink: Arc<dyn Sink>,
    pub signal: DrainSignal,
    pub interval: Duration,
    pub scheduler: SchedulerHandle,
    pub stats: SharedStats,
}

impl DrainTask {
    /// Run until the pipeline stops. Residual records are left for the
    /// final flush.
    pub async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let drained = tokio::select! {
                biased;
                _ = self.scheduler.stopped() => break,
                _ = self.signal.woken() => self.buffer.drain_if_at_least(self.signal.threshold()),
                _ = ticker.tick() => self.buffer.drain(),
            };
            match drained {
                Some(records) if !records.is_empty() => self.commit(records).await,
                _ => {}
            }
        }
        debug!(pending = self.buffer.len(), "drain task stopped");
    }

    async fn commit(&self, records: Vec<StructuredRecord>) {
        let sink = Arc::clone(&self.sink);
        let batch = RecordBatch::from(records);
        let count = batch.len() as u64;

        let result = tokio::task::spawn_blocking(move || sink.commit(batch))
            .await
            .unwrap_or_else(|err| Err(CommitError::Task(err.to_string())));
        record_commit(&self.stats, count, result);
    }
}

/// Count a commit outcome. A failed batch is gone; capture goes on.
pub(crate) fn record_commit(stats: &SharedStats, records: u64, result: Result<(), CommitError>) {
    match result {
        Ok(()) => {
            stats.record_batch_committed(records);
            debug!(records, "batch committed");
        }
        Err(err) => {
            stats.record_commit_failed(records);
            warn!(records, error = %err, "commit failed, batch discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::{self, PointerFields};
    use crate::scheduler::testing::detached_handle;
    use crate::sink::MemorySink;
    use crate::stats::create_shared_stats;

    fn record() -> StructuredRecord {
        builder::mouse_move(PointerFields::default())
    }

    fn task(threshold: usize, interval: Duration) -> (DrainTask, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let task = DrainTask {
            buffer: Arc::new(LockingBuffer::new()),
            sink: sink.clone(),
            signal: DrainSignal::new(threshold),
            interval,
            scheduler: detached_handle(),
            stats: create_shared_stats(),
        };
        (task, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_wakes_drain() {
        let (task, sink) = task(3, Duration::from_secs(3600));
        let buffer = Arc::clone(&task.buffer);
        let signal = task.signal.clone();
        let scheduler = task.scheduler.clone();
        let running = tokio::spawn(task.run());

        signal.pushed(buffer.extend([record(), record()]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.record_count(), 0);

        signal.pushed(buffer.extend([record()]));
        while sink.record_count() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        scheduler.stop();
        running.await.unwrap();
        assert_eq!(sink.batches().len(), 1);
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_drains_below_threshold() {
        let (task, sink) = task(100, Duration::from_secs(60));
        let buffer = Arc::clone(&task.buffer);
        let scheduler = task.scheduler.clone();
        let running = tokio::spawn(task.run());

        buffer.push(record());
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(sink.record_count(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        while sink.record_count() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        scheduler.stop();
        running.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_leaves_residue_for_final_flush() {
        let (task, sink) = task(10, Duration::from_secs(3600));
        let buffer = Arc::clone(&task.buffer);
        task.scheduler.stop();
        buffer.push(record());

        task.run().await;

        assert_eq!(sink.record_count(), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_failed_commit_counts_lost_records() {
        let stats = create_shared_stats();

        record_commit(&stats, 4, Err(CommitError::Task("sink gone".to_string())));
        record_commit(&stats, 2, Ok(()));

        let snapshot = stats.stats();
        assert_eq!(snapshot.commit_failures, 1);
        assert_eq!(snapshot.records_lost, 4);
        assert_eq!(snapshot.batches_committed, 1);
        assert_eq!(snapshot.records_committed, 2);
    }
}
