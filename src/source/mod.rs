//! Raw event sources and the loop that reads them.
//!
//! A source is opened by an [`OpenSource`] and read by exactly one
//! [`SourceLoop`]. The loop moves through three steps: opening, reading and
//! closed. An opening failure only affects that one source. A read failure
//! escapes the loop and stops the pipeline.

pub mod channel;
#[cfg(target_os = "linux")]
pub mod device;
pub mod replay;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::LockingBuffer;
use crate::error::SourceError;
use crate::event::RawEvent;
use crate::pipeline::drain::DrainSignal;
use crate::record::StructuredRecord;
use crate::scheduler::SchedulerHandle;
use crate::stats::SharedStats;
use crate::translate::EventSwitch;

pub use channel::{channel, ChannelSource};
pub use replay::ReplayFile;

/// An opened stream of raw events.
#[async_trait]
pub trait Source: Send {
    fn name(&self) -> &str;

    /// Wait for the next raw event. `Ok(None)` marks the end of the stream.
    ///
    /// Must be cancel safe: the loop drops this future when a stop is
    /// requested.
    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError>;

    /// Release the underlying handle. Dropping the source releases it too.
    async fn close(&mut self) {}
}

/// A source that has not been opened yet.
#[async_trait]
pub trait OpenSource: Send {
    fn name(&self) -> String;

    async fn open(self: Box<Self>) -> Result<Box<dyn Source>, SourceError>;
}

/// State shared by every source loop of one pipeline.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub buffer: Arc<LockingBuffer<StructuredRecord>>,
    pub scheduler: SchedulerHandle,
    pub drain: DrainSignal,
    pub stats: SharedStats,
}

/// What one source loop did before it closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub name: String,
    pub opened: bool,
    pub events: u64,
    pub records: u64,
}

/// A loop that stopped on a read failure, with what it did until then.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct LoopFailure {
    pub summary: LoopSummary,
    #[source]
    pub error: SourceError,
}

/// One cooperative task per source.
pub struct SourceLoop {
    opener: Box<dyn OpenSource>,
    switch: EventSwitch,
    context: LoopContext,
}

impl SourceLoop {
    pub fn new(opener: Box<dyn OpenSource>, context: LoopContext) -> Self {
        let switch = EventSwitch::new(context.stats.clone());
        Self {
            opener,
            switch,
            context,
        }
    }

    pub fn with_switch(opener: Box<dyn OpenSource>, switch: EventSwitch, context: LoopContext) -> Self {
        Self {
            opener,
            switch,
            context,
        }
    }

    pub fn name(&self) -> String {
        self.opener.name()
    }

    /// Run the loop to completion.
    ///
    /// Returns `Ok` when the source could not be opened, reached the end of
    /// its stream or observed a stop. Returns `Err` only for a mid-stream
    /// read failure; the summary still counts everything read before it.
    pub async fn run(self) -> Result<LoopSummary, LoopFailure> {
        let SourceLoop {
            opener,
            mut switch,
            context,
        } = self;
        let LoopContext {
            buffer,
            scheduler,
            drain,
            stats,
        } = context;
        let name = opener.name();
        let mut summary = LoopSummary {
            name: name.clone(),
            ..LoopSummary::default()
        };

        let mut source = match opener.open().await {
            Ok(source) => source,
            Err(err) => {
                warn!(source = %name, error = %err, "source unavailable, skipping");
                stats.record_source_failed();
                return Ok(summary);
            }
        };
        stats.record_source_opened();
        summary.opened = true;
        info!(source = %name, "reading source");

        let outcome = loop {
            if scheduler.is_stopped() {
                break Ok(());
            }
            let next = tokio::select! {
                biased;
                _ = scheduler.stopped() => break Ok(()),
                next = source.next_event() => next,
            };
            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!(source = %name, "end of stream");
                    break Ok(());
                }
                Err(err) => break Err(err),
            };

            summary.events += 1;
            stats.record_event_received();
            let batch = switch.dispatch(&event);
            if batch.is_empty() {
                continue;
            }
            let count = batch.len() as u64;
            let buffered = buffer.extend(batch);
            summary.records += count;
            stats.record_records_buffered(count);
            drain.pushed(buffered);
        };

        source.close().await;
        drop(source);
        debug!(
            source = %name,
            events = summary.events,
            records = summary.records,
            "source closed"
        );
        match outcome {
            Ok(()) => Ok(summary),
            Err(error) => Err(LoopFailure { summary, error }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Scripted source: yields its events, then either ends or fails.
    pub struct ScriptedSource {
        pub name: String,
        pub events: VecDeque<RawEvent>,
        pub fail_at_end: bool,
    }

    #[async_trait]
    impl Source for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
            match self.events.pop_front() {
                Some(event) => Ok(Some(event)),
                None if self.fail_at_end => Err(SourceError::io(
                    self.name.clone(),
                    io::Error::new(io::ErrorKind::BrokenPipe, "device went away"),
                )),
                None => Ok(None),
            }
        }
    }

    #[async_trait]
    impl OpenSource for ScriptedSource {
        fn name(&self) -> String {
            self.name.clone()
        }

        async fn open(self: Box<Self>) -> Result<Box<dyn Source>, SourceError> {
            Ok(self)
        }
    }

    /// Source whose opening always fails.
    pub struct Unavailable(pub &'static str);

    #[async_trait]
    impl OpenSource for Unavailable {
        fn name(&self) -> String {
            self.0.to_string()
        }

        async fn open(self: Box<Self>) -> Result<Box<dyn Source>, SourceError> {
            Err(SourceError::open(
                self.0,
                io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::event::code;
    use crate::record::{field, RecordKind};
    use crate::stats::create_shared_stats;
    use crate::translate::testing::{added, at, motion, mouse};
    use std::time::Duration;

    fn context(handle: SchedulerHandle) -> LoopContext {
        LoopContext {
            buffer: Arc::new(LockingBuffer::new()),
            scheduler: handle,
            drain: DrainSignal::new(100),
            stats: create_shared_stats(),
        }
    }

    fn scripted(events: Vec<RawEvent>, fail_at_end: bool) -> Box<ScriptedSource> {
        Box::new(ScriptedSource {
            name: "scripted".to_string(),
            events: events.into(),
            fail_at_end,
        })
    }

    fn handle() -> SchedulerHandle {
        crate::scheduler::testing::detached_handle()
    }

    #[tokio::test]
    async fn test_records_follow_event_order() {
        let ctx = context(handle());
        let events = vec![
            RawEvent::hierarchy(at(0), added(vec![mouse(2)])),
            motion(2, 10, &[(0, 1.0)]),
            motion(2, 20, &[(0, 1.0), (3, 1.0)]),
            motion(2, 45, &[(1, 1.0)]),
        ];

        let summary = SourceLoop::new(scripted(events, false), ctx.clone())
            .run()
            .await
            .unwrap();

        assert!(summary.opened);
        assert_eq!(summary.events, 4);
        assert_eq!(summary.records, 4);
        let records = ctx.buffer.drain().unwrap();
        let kinds: Vec<_> = records.iter().map(|record| record.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::MouseMove,
                RecordKind::MouseMove,
                RecordKind::MouseScroll,
                RecordKind::MouseMove
            ]
        );
        let intervals: Vec<_> = records
            .iter()
            .map(|record| record.fields()[field::INTERVAL].as_str())
            .collect();
        assert_eq!(intervals, vec!["", "10", "10", "25"]);
    }

    #[tokio::test]
    async fn test_open_failure_is_not_fatal() {
        let ctx = context(handle());

        let summary = SourceLoop::new(Box::new(Unavailable("missing")), ctx.clone())
            .run()
            .await
            .unwrap();

        assert!(!summary.opened);
        assert_eq!(ctx.stats.stats().sources_failed, 1);
        assert!(!ctx.scheduler.is_stopped());
    }

    #[tokio::test]
    async fn test_read_failure_escapes_after_buffering() {
        let ctx = context(handle());
        let events = vec![
            RawEvent::hierarchy(at(0), added(vec![mouse(2)])),
            motion(2, 10, &[(0, 1.0)]),
        ];

        let failure = SourceLoop::new(scripted(events, true), ctx.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SourceError::Io { .. }));
        assert_eq!(ctx.buffer.len(), 1);
        assert!(failure.summary.opened);
        assert_eq!(failure.summary.events, 2);
        assert_eq!(failure.summary.records, 1);
    }

    #[tokio::test]
    async fn test_stop_closes_idle_source() {
        let ctx = context(handle());
        let (sender, source) = channel("idle", 4);

        let task = tokio::spawn(SourceLoop::new(Box::new(source), ctx.clone()).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.scheduler.stop();

        let summary = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary.events, 0);
        drop(sender);
    }

    #[tokio::test]
    async fn test_unclaimed_events_are_counted_but_produce_nothing() {
        let ctx = context(handle());
        let events = vec![RawEvent::device(code::BARRIER_HIT + 100, at(0), Default::default())];

        let summary = SourceLoop::new(scripted(events, false), ctx.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.events, 1);
        assert!(ctx.buffer.is_empty());
        assert_eq!(ctx.stats.stats().events_received, 1);
    }
}
