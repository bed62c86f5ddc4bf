//! Structured records: the normalized form of every captured input event.
//!
//! Records are laid out from a static schema registry ([`RecordKind::fields`])
//! and built through the pure constructors in [`builder`].

pub mod builder;
pub mod entry;
pub mod schema;
pub mod values;

pub use entry::{FieldEntry, RecordBatch, RecordEntry, StructuredRecord};
pub use schema::{field, Coding, FieldSpec, RecordKind, TIMESTAMP_FORMAT};
pub use values::{BarrierAction, ButtonAction, DeviceType, Modifier};
