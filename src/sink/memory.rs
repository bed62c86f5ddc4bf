//! Sink that keeps batches in memory, for embedding and tests.

use parking_lot::Mutex;

use super::Sink;
use crate::error::CommitError;
use crate::record::{RecordBatch, StructuredRecord};

#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<RecordBatch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed batches in commit order.
    pub fn batches(&self) -> Vec<RecordBatch> {
        self.batches.lock().clone()
    }

    /// All committed records, flattened in commit order.
    pub fn records(&self) -> Vec<StructuredRecord> {
        self.batches
            .lock()
            .iter()
            .flat_map(|batch| batch.iter().cloned())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(RecordBatch::len).sum()
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn commit(&self, batch: RecordBatch) -> Result<(), CommitError> {
        self.batches.lock().push(batch);
        Ok(())
    }
}
