//! Wiring of sources, buffer, drain task and sink onto one scheduler.
//!
//! ```text
//!  source ─▶ SourceLoop ─┐
//!  source ─▶ SourceLoop ─┼─▶ LockingBuffer ─▶ DrainTask ─▶ Sink
//!  source ─▶ SourceLoop ─┘                                  ▲
//!                                     final flush (join) ───┘
//! ```
//!
//! The pipeline stops itself once every source loop has closed. It can also
//! be stopped from outside through [`RunningPipeline::handle`]. After all
//! tasks have finished, whatever is left in the buffer is committed once.

pub mod drain;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::buffer::LockingBuffer;
use crate::error::PipelineError;
use crate::record::{RecordBatch, StructuredRecord};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::sink::Sink;
use crate::source::{LoopContext, LoopSummary, OpenSource, SourceLoop};
use crate::stats::{create_shared_stats, SharedStats, StatsSnapshot};

use drain::{record_commit, DrainSignal, DrainTask};

/// Workers beyond one per source, for the drain task and bookkeeping.
pub const EXTRA_WORKERS: usize = 2;
pub const DEFAULT_THRESHOLD: usize = 100;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Construction parameters for a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Worker pool size. `None` means one per source plus [`EXTRA_WORKERS`].
    pub worker_threads: Option<usize>,
    /// Record count that triggers a drain.
    pub threshold: usize,
    /// Time between unconditional drains.
    pub interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            threshold: DEFAULT_THRESHOLD,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PipelineConfig {
    pub fn workers_for(&self, sources: usize) -> usize {
        self.worker_threads
            .unwrap_or(sources + EXTRA_WORKERS)
            .max(1)
    }
}

/// Why a pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every source reached the end of its stream or failed to open.
    SourcesClosed,
    /// `stop()` was called from outside.
    Requested,
    /// A task failed. Only reported inside [`PipelineError::Fatal`].
    Failed,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub stop_reason: StopReason,
    pub stats: StatsSnapshot,
    pub sources: Vec<LoopSummary>,
    /// Records committed by the final flush.
    pub flushed: usize,
}

/// A pipeline under construction.
pub struct Pipeline {
    config: PipelineConfig,
    sources: Vec<Box<dyn OpenSource>>,
    sink: Arc<dyn Sink>,
    stats: SharedStats,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, sink: impl Sink + 'static) -> Self {
        Self::with_shared_sink(config, Arc::new(sink))
    }

    pub fn with_shared_sink(config: PipelineConfig, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            sources: Vec::new(),
            sink,
            stats: create_shared_stats(),
        }
    }

    pub fn with_source(mut self, source: impl OpenSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    pub fn add_source(&mut self, source: Box<dyn OpenSource>) {
        self.sources.push(source);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Start every task and return without waiting.
    pub fn start(self) -> Result<RunningPipeline, PipelineError> {
        let Pipeline {
            config,
            sources,
            sink,
            stats,
        } = self;
        if sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let workers = config.workers_for(sources.len());
        let scheduler = Scheduler::new(workers)?;
        let handle = scheduler.handle().clone();
        let buffer = Arc::new(LockingBuffer::new());
        let signal = DrainSignal::new(config.threshold);
        info!(
            sources = sources.len(),
            workers,
            threshold = config.threshold,
            interval_secs = config.interval.as_secs(),
            "starting capture pipeline"
        );

        scheduler.spawn_with(
            DrainTask {
                buffer: Arc::clone(&buffer),
                sink: Arc::clone(&sink),
                signal: signal.clone(),
                interval: config.interval,
                scheduler: handle.clone(),
                stats: Arc::clone(&stats),
            }
            .run(),
            |_| {},
        );

        let context = LoopContext {
            buffer: Arc::clone(&buffer),
            scheduler: handle.clone(),
            drain: signal,
            stats: Arc::clone(&stats),
        };
        let live = Arc::new(AtomicUsize::new(sources.len()));
        let closed = Arc::new(AtomicBool::new(false));
        let summaries = Arc::new(Mutex::new(Vec::new()));
        for opener in sources {
            let source_loop = SourceLoop::new(opener, context.clone());
            let name = source_loop.name();
            let handle = handle.clone();
            let live = Arc::clone(&live);
            let closed = Arc::clone(&closed);
            let summaries = Arc::clone(&summaries);
            scheduler.spawn_with(source_loop.run(), move |outcome| {
                match outcome {
                    Ok(Ok(summary)) => summaries.lock().push(summary),
                    Ok(Err(failure)) => {
                        handle.fail(failure.to_string());
                        summaries.lock().push(failure.summary);
                    }
                    // Already recorded as the failure by the scheduler.
                    Err(_) => summaries.lock().push(LoopSummary {
                        name,
                        ..LoopSummary::default()
                    }),
                }
                if live.fetch_sub(1, Ordering::SeqCst) == 1 {
                    closed.store(true, Ordering::SeqCst);
                    info!("all sources closed");
                    handle.stop();
                }
            });
        }

        Ok(RunningPipeline {
            scheduler,
            buffer,
            sink,
            stats,
            closed,
            summaries,
            started: Instant::now(),
        })
    }

    /// Start, then wait for the pipeline to finish.
    pub fn run(self) -> Result<PipelineReport, PipelineError> {
        self.start()?.wait()
    }
}

/// A started pipeline.
pub struct RunningPipeline {
    scheduler: Scheduler,
    buffer: Arc<LockingBuffer<StructuredRecord>>,
    sink: Arc<dyn Sink>,
    stats: SharedStats,
    closed: Arc<AtomicBool>,
    summaries: Arc<Mutex<Vec<LoopSummary>>>,
    started: Instant,
}

impl RunningPipeline {
    /// Handle for stopping the pipeline from another thread.
    pub fn handle(&self) -> SchedulerHandle {
        self.scheduler.handle().clone()
    }

    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Block until every task has finished, flush the residue, and report.
    ///
    /// A fatal failure is returned as an error only after the flush.
    pub fn wait(self) -> Result<PipelineReport, PipelineError> {
        let RunningPipeline {
            scheduler,
            mut buffer,
            sink,
            stats,
            closed,
            summaries,
            started,
        } = self;
        let handle = scheduler.handle().clone();
        scheduler.join();

        let residue = match Arc::get_mut(&mut buffer) {
            Some(buffer) => buffer.drain_unlocked(),
            None => buffer.drain(),
        };
        let flushed = residue.as_ref().map_or(0, Vec::len);
        if let Some(records) = residue {
            let batch = RecordBatch::from(records);
            info!(records = flushed, "final flush");
            record_commit(&stats, flushed as u64, sink.commit(batch));
        }

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "capture pipeline stopped");
        let failure = handle.failure();
        let stop_reason = if failure.is_some() {
            StopReason::Failed
        } else if closed.load(Ordering::SeqCst) {
            StopReason::SourcesClosed
        } else {
            StopReason::Requested
        };
        let report = PipelineReport {
            stop_reason,
            stats: stats.stats(),
            sources: std::mem::take(&mut *summaries.lock()),
            flushed,
        };

        match failure {
            Some(reason) => {
                error!(error = %reason, "capture pipeline failed");
                Err(PipelineError::Fatal {
                    reason,
                    report: Box::new(report),
                })
            }
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.workers_for(3), 5);
        assert_eq!(config.threshold, 100);
        assert_eq!(config.interval, Duration::from_secs(60));

        let fixed = PipelineConfig {
            worker_threads: Some(0),
            ..PipelineConfig::default()
        };
        assert_eq!(fixed.workers_for(3), 1);
    }

    #[test]
    fn test_no_sources_is_an_error() {
        let pipeline = Pipeline::new(PipelineConfig::default(), crate::sink::MemorySink::new());
        assert!(matches!(pipeline.run(), Err(PipelineError::NoSources)));
    }
}
