//! Structured records and the batches they travel in.

use serde::Serialize;

use super::schema::RecordKind;
use super::values::Modifier;
use crate::error::RecordError;

/// One normalized input event.
///
/// `fields` always has exactly the schema length of `kind`. The empty string
/// marks a field that was not observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord {
    kind: RecordKind,
    fields: Vec<String>,
    modifiers: Vec<String>,
    named: bool,
}

impl StructuredRecord {
    /// Build a record, checking the field count against the schema.
    pub fn new(
        kind: RecordKind,
        fields: Vec<String>,
        modifiers: Vec<String>,
    ) -> Result<Self, RecordError> {
        if fields.len() != kind.field_count() {
            return Err(RecordError {
                kind,
                expected: kind.field_count(),
                actual: fields.len(),
            });
        }
        Ok(Self::from_schema(kind, fields, modifiers))
    }

    /// Build a record from fields that were laid out from the schema.
    pub(crate) fn from_schema(kind: RecordKind, fields: Vec<String>, modifiers: Vec<String>) -> Self {
        debug_assert_eq!(fields.len(), kind.field_count(), "{kind} field count");
        Self {
            kind,
            fields,
            modifiers,
            named: false,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    /// Look up a field by its schema name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.kind
            .field_index(name)
            .and_then(|index| self.fields.get(index))
            .map(String::as_str)
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    /// Replace coded fields and modifiers with their names.
    ///
    /// Runs at most once per record. Values that are not a known code are
    /// left as they are.
    pub fn to_named_representation(&mut self) {
        if self.named {
            return;
        }
        for (spec, value) in self.kind.fields().iter().zip(self.fields.iter_mut()) {
            let Some(coding) = spec.coding else { continue };
            if let Some(name) = coding.name_of(value) {
                *value = name.to_string();
            }
        }
        for value in &mut self.modifiers {
            let named = value
                .parse::<u8>()
                .ok()
                .and_then(Modifier::from_code)
                .map(Modifier::name);
            if let Some(name) = named {
                *value = name.to_string();
            }
        }
        self.named = true;
    }

    /// Serializable view pairing every field with its name.
    pub fn entry(&self) -> RecordEntry<'_> {
        RecordEntry {
            kind: self.kind.name(),
            fields: self
                .kind
                .field_names()
                .zip(self.fields.iter())
                .map(|(name, data)| FieldEntry { name, data })
                .collect(),
            modifiers: &self.modifiers,
        }
    }
}

/// Serialized form of a record: `{"type", "fields": [{"name", "data"}], "modifiers"}`.
#[derive(Debug, Serialize)]
pub struct RecordEntry<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub fields: Vec<FieldEntry<'a>>,
    pub modifiers: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct FieldEntry<'a> {
    pub name: &'static str,
    pub data: &'a str,
}

/// Ordered collection of records. Order is append order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    records: Vec<StructuredRecord>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StructuredRecord) {
        self.records.push(record);
    }

    /// Append every record of `other` after the records already held.
    pub fn merge_with(&mut self, mut other: RecordBatch) {
        if self.records.is_empty() {
            self.records = other.records;
        } else {
            self.records.append(&mut other.records);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StructuredRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructuredRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<StructuredRecord> {
        self.records
    }

    /// Apply the named rewrite to every record.
    pub fn to_named_representation(&mut self) {
        for record in &mut self.records {
            record.to_named_representation();
        }
    }
}

impl From<Vec<StructuredRecord>> for RecordBatch {
    fn from(records: Vec<StructuredRecord>) -> Self {
        Self { records }
    }
}

impl From<StructuredRecord> for RecordBatch {
    fn from(record: StructuredRecord) -> Self {
        Self {
            records: vec![record],
        }
    }
}

impl IntoIterator for RecordBatch {
    type Item = StructuredRecord;
    type IntoIter = std::vec::IntoIter<StructuredRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a StructuredRecord;
    type IntoIter = std::slice::Iter<'a, StructuredRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_fields(action: &str) -> Vec<String> {
        let mut fields = vec![String::new(); RecordKind::MouseClick.field_count()];
        fields[11] = "0".to_string();
        fields[12] = "1".to_string();
        fields[13] = "Button Left".to_string();
        fields[14] = action.to_string();
        fields
    }

    #[test]
    fn test_new_rejects_wrong_field_count() {
        let err = StructuredRecord::new(RecordKind::MouseMove, vec![String::new(); 11], vec![])
            .unwrap_err();
        assert_eq!(err.expected, 12);
        assert_eq!(err.actual, 11);
        assert!(err.to_string().contains("MouseMove"));
    }

    #[test]
    fn test_named_representation() {
        let mut record = StructuredRecord::new(
            RecordKind::MouseClick,
            click_fields("1"),
            vec!["0".to_string(), "6".to_string()],
        )
        .unwrap();

        record.to_named_representation();

        assert!(record.is_named());
        assert_eq!(record.field("device_type"), Some("Mouse"));
        assert_eq!(record.field("button_action"), Some("Release"));
        assert_eq!(record.field("button_name"), Some("Button Left"));
        assert_eq!(record.modifiers(), &["Shift".to_string(), "Super".to_string()]);
    }

    #[test]
    fn test_named_representation_applies_once() {
        let mut record =
            StructuredRecord::new(RecordKind::MouseClick, click_fields("0"), vec![]).unwrap();
        record.to_named_representation();
        let once = record.clone();
        record.to_named_representation();
        assert_eq!(record, once);
    }

    #[test]
    fn test_named_representation_leaves_uncoded_scroll_fields() {
        let mut fields = vec![String::new(); RecordKind::MouseScroll.field_count()];
        fields[11] = "2".to_string();
        fields[12] = "1.000000".to_string();
        fields[13] = "2".to_string();
        let mut record = StructuredRecord::new(RecordKind::MouseScroll, fields, vec![]).unwrap();

        record.to_named_representation();

        assert_eq!(record.field("device_type"), Some("Touchpad"));
        assert_eq!(record.field("scroll_horizontal"), Some("2"));
    }

    #[test]
    fn test_entry_pairs_names_with_data() {
        let record = StructuredRecord::new(RecordKind::MouseClick, click_fields("0"), vec![]).unwrap();
        let json = serde_json::to_value(record.entry()).unwrap();

        assert_eq!(json["type"], "MouseClick");
        assert_eq!(json["fields"].as_array().unwrap().len(), 15);
        assert_eq!(json["fields"][12]["name"], "button_id");
        assert_eq!(json["fields"][12]["data"], "1");
    }

    #[test]
    fn test_merge_preserves_order() {
        let first = StructuredRecord::new(RecordKind::MouseClick, click_fields("0"), vec![]).unwrap();
        let second = StructuredRecord::new(RecordKind::MouseClick, click_fields("1"), vec![]).unwrap();

        let mut batch = RecordBatch::from(first.clone());
        batch.merge_with(RecordBatch::from(second.clone()));
        batch.merge_with(RecordBatch::new());

        assert_eq!(batch.records(), &[first, second]);
    }
}
