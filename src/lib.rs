//! evcapture - input event capture and aggregation.
//!
//! Raw input events are read concurrently from several sources, translated
//! into fixed-schema records, buffered in one shared buffer and periodically
//! handed to a sink in batches.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Scheduler                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌─────────────┐                                │
//! │  │ Source     │──▶│ EventSwitch │──┐                             │
//! │  │ (device)   │   │ (translate) │  │   ┌───────────────┐         │
//! │  └────────────┘   └─────────────┘  ├──▶│ LockingBuffer │         │
//! │  ┌────────────┐   ┌─────────────┐  │   └───────┬───────┘         │
//! │  │ Source     │──▶│ EventSwitch │──┘           │                 │
//! │  │ (replay)   │   │ (translate) │              ▼                 │
//! │  └────────────┘   └─────────────┘      ┌──────────────┐  ┌──────┐│
//! │                                        │  DrainTask   │─▶│ Sink ││
//! │                                        └──────────────┘  └──────┘│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use evcapture::pipeline::{Pipeline, PipelineConfig};
//! use evcapture::sink::JsonSink;
//! use evcapture::source::ReplayFile;
//!
//! let report = Pipeline::new(PipelineConfig::default(), JsonSink::stdout())
//!     .with_source(ReplayFile::new("session.jsonl"))
//!     .run()
//!     .expect("capture failed");
//! println!("{} records committed", report.stats.records_committed);
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod record;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod stats;
pub mod translate;

// Re-export key types at crate root for convenience
pub use buffer::LockingBuffer;
pub use config::{Config, ConfigError};
pub use error::{CommitError, PipelineError, RecordError, SourceError, TranslationError};
pub use event::{DeviceEvent, DeviceInfo, HierarchyEvent, Payload, RawEvent};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, RunningPipeline, StopReason};
pub use record::{RecordBatch, RecordKind, StructuredRecord};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use sink::{JsonLinesSink, JsonSink, MemorySink, Sink, SinkSet};
pub use source::{LoopFailure, OpenSource, Source, SourceLoop};
pub use stats::{CaptureStats, SharedStats, StatsSnapshot};
pub use translate::EventSwitch;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
