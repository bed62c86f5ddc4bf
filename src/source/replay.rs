//! Replay of raw events recorded as JSON Lines.
//!
//! Each non-blank line is one serialized [`RawEvent`]. Lines that do not
//! parse, including lines that are not valid UTF-8, are logged and skipped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{OpenSource, Source};
use crate::error::SourceError;
use crate::event::RawEvent;

/// A replay file that has not been opened yet.
#[derive(Debug, Clone)]
pub struct ReplayFile {
    path: PathBuf,
}

impl ReplayFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OpenSource for ReplayFile {
    fn name(&self) -> String {
        format!("replay:{}", self.path.display())
    }

    async fn open(self: Box<Self>) -> Result<Box<dyn Source>, SourceError> {
        let name = self.name();
        let file = File::open(&self.path)
            .await
            .map_err(|err| SourceError::open(name.clone(), err))?;
        Ok(Box::new(ReplaySource {
            name,
            reader: BufReader::new(file),
            text: Vec::new(),
            line: 0,
        }))
    }
}

pub struct ReplaySource {
    name: String,
    reader: BufReader<File>,
    text: Vec<u8>,
    line: u64,
}

#[async_trait]
impl Source for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
        loop {
            // A partially read line stays in `text` if this future is dropped.
            let read = self
                .reader
                .read_until(b'\n', &mut self.text)
                .await
                .map_err(|err| SourceError::io(self.name.clone(), err))?;
            if read == 0 && self.text.is_empty() {
                return Ok(None);
            }
            let text = std::mem::take(&mut self.text);
            self.line += 1;
            if text.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(&text) {
                Ok(event) => return Ok(Some(event)),
                Err(err) => {
                    warn!(
                        source = %self.name,
                        line = self.line,
                        error = %err,
                        "skipping malformed replay line"
                    );
                }
            }
        }
    }
}
