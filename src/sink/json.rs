//! JSON sinks for stdout and files.

use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

use super::Sink;
use crate::error::CommitError;
use crate::record::{RecordBatch, RecordEntry, StructuredRecord};

type Writer = Box<dyn Write + Send>;

fn append_writer(path: &Path) -> io::Result<Writer> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// One document per batch.
#[derive(Serialize)]
struct BatchDocument<'a> {
    batch_id: Uuid,
    entries: Vec<RecordEntry<'a>>,
}

/// Writes every batch as one pretty-printed JSON document with named
/// field values.
pub struct JsonSink {
    name: String,
    out: Mutex<Writer>,
}

impl JsonSink {
    pub fn stdout() -> Self {
        Self::from_writer("stdout", Box::new(io::stdout()))
    }

    pub fn append(path: &Path) -> io::Result<Self> {
        Ok(Self::from_writer(path.display().to_string(), append_writer(path)?))
    }

    pub fn from_writer(name: impl Into<String>, out: Writer) -> Self {
        Self {
            name: name.into(),
            out: Mutex::new(out),
        }
    }
}

impl Sink for JsonSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn commit(&self, mut batch: RecordBatch) -> Result<(), CommitError> {
        batch.to_named_representation();
        let document = BatchDocument {
            batch_id: Uuid::new_v4(),
            entries: batch.iter().map(StructuredRecord::entry).collect(),
        };

        let mut out = self.out.lock();
        serde_json::to_writer_pretty(&mut *out, &document)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// One line per record.
#[derive(Serialize)]
struct RecordLine<'a> {
    batch_id: Uuid,
    #[serde(flatten)]
    entry: RecordEntry<'a>,
}

/// Writes one compact JSON object per record, tagged with its batch id.
pub struct JsonLinesSink {
    name: String,
    out: Mutex<Writer>,
}

impl JsonLinesSink {
    pub fn append(path: &Path) -> io::Result<Self> {
        Ok(Self::from_writer(path.display().to_string(), append_writer(path)?))
    }

    pub fn from_writer(name: impl Into<String>, out: Writer) -> Self {
        Self {
            name: name.into(),
            out: Mutex::new(out),
        }
    }
}

impl Sink for JsonLinesSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn commit(&self, mut batch: RecordBatch) -> Result<(), CommitError> {
        batch.to_named_representation();
        let batch_id = Uuid::new_v4();

        let mut out = self.out.lock();
        for record in &batch {
            let line = RecordLine {
                batch_id,
                entry: record.entry(),
            };
            serde_json::to_writer(&mut *out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::{self, ButtonFields, PointerFields};
    use crate::record::{ButtonAction, DeviceType, Modifier};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn click() -> StructuredRecord {
        let pointer = PointerFields {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            position: Some((10.0, 20.0)),
            device_name: Some("mouse".to_string()),
            device_type: DeviceType::Mouse,
            modifiers: vec![Modifier::Control],
            ..PointerFields::default()
        };
        builder::mouse_click(
            pointer,
            ButtonFields {
                button_id: 1,
                button_name: Some("Button Left".to_string()),
                action: ButtonAction::Release,
            },
        )
    }

    fn field<'a>(entry: &'a Value, name: &str) -> &'a str {
        entry["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|field| field["name"] == name)
            .and_then(|field| field["data"].as_str())
            .unwrap()
    }

    #[test]
    fn test_json_document_uses_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("batches.json");
        let sink = JsonSink::append(&path).unwrap();

        sink.commit(RecordBatch::from(vec![click(), click()])).unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&path).unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert!(Uuid::parse_str(document["batch_id"].as_str().unwrap()).is_ok());
        let entries = document["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["type"], "MouseClick");
        assert_eq!(entries[0]["fields"].as_array().unwrap().len(), 15);
        assert_eq!(field(&entries[0], "device_type"), "Mouse");
        assert_eq!(field(&entries[0], "button_action"), "Release");
        assert_eq!(field(&entries[0], "position_x"), "10.000000");
        assert_eq!(entries[0]["modifiers"][0], "Control");
    }

    #[test]
    fn test_json_appends_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches.json");
        let sink = JsonSink::append(&path).unwrap();

        sink.commit(click().into()).unwrap();
        sink.commit(click().into()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let documents: Vec<Value> = serde_json::Deserializer::from_str(&text)
            .into_iter::<Value>()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(documents.len(), 2);
        assert_ne!(documents[0]["batch_id"], documents[1]["batch_id"]);
    }

    #[test]
    fn test_json_lines_share_batch_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonLinesSink::append(&path).unwrap();

        sink.commit(RecordBatch::from(vec![click(), click()])).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["batch_id"], lines[1]["batch_id"]);
        assert_eq!(lines[1]["type"], "MouseClick");
        assert_eq!(field(&lines[1], "button_name"), "Button Left");
    }

    #[test]
    fn test_empty_batch_writes_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let sink = JsonSink::append(&path).unwrap();

        sink.commit(RecordBatch::new()).unwrap();

        let document: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["entries"], Value::Array(vec![]));
    }
}
