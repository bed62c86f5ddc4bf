//! Persistence boundary for drained batches.
//!
//! Sinks are synchronous. The drain task runs them on the blocking pool, so
//! a slow disk never holds a worker thread.

pub mod json;
pub mod memory;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::config::ConfigError;
use crate::error::CommitError;
use crate::record::RecordBatch;

pub use json::{JsonLinesSink, JsonSink};
pub use memory::MemorySink;

/// Receiver of record batches.
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Persist one batch. On failure the batch is lost.
    fn commit(&self, batch: RecordBatch) -> Result<(), CommitError>;
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn commit(&self, batch: RecordBatch) -> Result<(), CommitError> {
        (**self).commit(batch)
    }
}

/// Fans every batch out to several sinks in order.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn Sink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Open every output. Fails on the first spec that cannot be used.
    pub fn open(outputs: &[String]) -> Result<Self, ConfigError> {
        let mut set = Self::new();
        for output in outputs {
            set.push(output.parse::<Output>()?.open()?);
        }
        Ok(set)
    }
}

impl Sink for SinkSet {
    fn name(&self) -> &str {
        "sinks"
    }

    /// Every sink sees the batch even if an earlier one failed. The first
    /// failure is returned.
    fn commit(&self, batch: RecordBatch) -> Result<(), CommitError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.commit(batch.clone()) {
                warn!(sink = sink.name(), error = %err, "sink rejected batch");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|sink| sink.name()))
            .finish()
    }
}

/// Where batches go, as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// `-`: pretty JSON documents on stdout.
    Stdout,
    /// Pretty JSON documents appended to a file.
    Json(PathBuf),
    /// `*.jsonl`: one JSON object per record.
    JsonLines(PathBuf),
}

impl Output {
    pub fn open(&self) -> Result<Box<dyn Sink>, ConfigError> {
        let sink: Box<dyn Sink> = match self {
            Output::Stdout => Box::new(JsonSink::stdout()),
            Output::Json(path) => {
                Box::new(JsonSink::append(path).map_err(|err| ConfigError::io(path, err))?)
            }
            Output::JsonLines(path) => {
                Box::new(JsonLinesSink::append(path).map_err(|err| ConfigError::io(path, err))?)
            }
        };
        Ok(sink)
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FromStr for Output {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ConfigError::Invalid("empty output".to_string()));
        }
        if spec == "-" {
            return Ok(Output::Stdout);
        }
        let path = PathBuf::from(spec);
        if has_extension(&path, &["sqlite", "sqlite3", "db"]) {
            return Err(ConfigError::UnsupportedOutput(spec.to_string()));
        }
        if has_extension(&path, &["jsonl", "ndjson"]) {
            Ok(Output::JsonLines(path))
        } else {
            Ok(Output::Json(path))
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout => write!(f, "-"),
            Output::Json(path) | Output::JsonLines(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::{self, PointerFields};
    use std::io;
    use std::sync::Arc;

    struct Broken;

    impl Sink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn commit(&self, _batch: RecordBatch) -> Result<(), CommitError> {
            Err(CommitError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
        }
    }

    fn batch() -> RecordBatch {
        builder::mouse_move(PointerFields::default()).into()
    }

    #[test]
    fn test_parse_outputs() {
        assert_eq!("-".parse::<Output>().unwrap(), Output::Stdout);
        assert_eq!(
            "events.jsonl".parse::<Output>().unwrap(),
            Output::JsonLines(PathBuf::from("events.jsonl"))
        );
        assert_eq!(
            "/tmp/out.json".parse::<Output>().unwrap(),
            Output::Json(PathBuf::from("/tmp/out.json"))
        );
        assert!(matches!(
            "capture.sqlite".parse::<Output>(),
            Err(ConfigError::UnsupportedOutput(_))
        ));
        assert!(matches!("events.DB".parse::<Output>(), Err(ConfigError::UnsupportedOutput(_))));
        assert!(matches!("  ".parse::<Output>(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sink_set_reaches_every_sink() {
        let first = Arc::new(MemorySink::new());
        let last = Arc::new(MemorySink::new());
        let set = SinkSet::new()
            .with(Arc::clone(&first))
            .with(Broken)
            .with(Arc::clone(&last));

        let err = set.commit(batch()).unwrap_err();

        assert!(matches!(err, CommitError::Io(_)));
        assert_eq!(first.record_count(), 1);
        assert_eq!(last.record_count(), 1);
    }

    #[test]
    fn test_open_creates_file_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = vec![
            dir.path().join("a.json").display().to_string(),
            dir.path().join("b.jsonl").display().to_string(),
        ];

        let set = SinkSet::open(&outputs).unwrap();
        set.commit(batch()).unwrap();

        assert_eq!(set.len(), 2);
        assert!(dir.path().join("a.json").exists());
        assert!(dir.path().join("b.jsonl").exists());
    }
}
