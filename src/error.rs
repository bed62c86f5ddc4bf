//! Error types for the capture pipeline.
//!
//! Errors are split by how far they are allowed to travel. Opening failures,
//! translation failures and commit failures are handled where they occur.
//! A source that fails mid-stream escapes its loop and stops the pipeline.

use std::io;
use thiserror::Error;

use crate::pipeline::PipelineReport;
use crate::record::RecordKind;

/// Failure to acquire or read from a raw event source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened. Only that source is affected.
    #[error("failed to open source {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The source failed mid-stream.
    #[error("source {name} failed while reading: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    pub fn open(name: impl Into<String>, source: io::Error) -> Self {
        SourceError::Open {
            name: name.into(),
            source,
        }
    }

    pub fn io(name: impl Into<String>, source: io::Error) -> Self {
        SourceError::Io {
            name: name.into(),
            source,
        }
    }
}

/// A raw event that a claiming translator could not turn into records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("event type {event_type} carries a {found} payload, expected {expected}")]
    PayloadMismatch {
        event_type: u16,
        expected: &'static str,
        found: &'static str,
    },

    #[error("event type {event_type} is malformed: {reason}")]
    Malformed { event_type: u16, reason: String },
}

/// Failure to persist a batch. The batch is discarded.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to write batch: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("commit task did not complete: {0}")]
    Task(String),
}

/// A record whose field count does not match its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} records have {expected} fields, got {actual}")]
pub struct RecordError {
    pub kind: RecordKind,
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to build worker pool: {0}")]
    Build(#[from] io::Error),
}

/// Errors surfaced by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("no sources configured")]
    NoSources,

    /// A task failed and stopped the pipeline. Carries the first failure and
    /// the report of the run up to it.
    #[error("pipeline stopped after a fatal error: {reason}")]
    Fatal {
        reason: String,
        report: Box<PipelineReport>,
    },
}
