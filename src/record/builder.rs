//! Pure constructors for each record kind.
//!
//! Callers describe a record with plain structs and get back a record whose
//! layout is taken from the schema registry.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::entry::StructuredRecord;
use super::schema::{format_double, format_interval, format_optional, format_timestamp, RecordKind};
use super::values::{BarrierAction, ButtonAction, DeviceType, Modifier};
use crate::event::FocusWindow;

/// Fields shared by every pointer-derived record.
#[derive(Debug, Clone, Default)]
pub struct PointerFields {
    pub interval: Option<Duration>,
    pub timestamp: DateTime<Utc>,
    pub position: Option<(f64, f64)>,
    pub device_name: Option<String>,
    pub focus: Option<FocusWindow>,
    pub screen: Option<i32>,
    pub device_type: DeviceType,
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone)]
pub struct ButtonFields {
    pub button_id: i32,
    pub button_name: Option<String>,
    pub action: ButtonAction,
}

#[derive(Debug, Clone)]
pub struct KeyFields {
    pub button: ButtonFields,
    pub character: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollFields {
    pub vertical: Option<f64>,
    pub horizontal: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct BarrierFields {
    pub barrier_id: u32,
    pub event_id: u32,
    pub delta: (f64, f64),
    pub action: BarrierAction,
}

pub fn mouse_move(pointer: PointerFields) -> StructuredRecord {
    finish(RecordKind::MouseMove, pointer, |_| {})
}

pub fn mouse_scroll(pointer: PointerFields, scroll: ScrollFields) -> StructuredRecord {
    finish(RecordKind::MouseScroll, pointer, |fields| {
        fields.push(format_optional(scroll.vertical.map(format_double)));
        fields.push(format_optional(scroll.horizontal.map(format_double)));
    })
}

pub fn mouse_click(pointer: PointerFields, button: ButtonFields) -> StructuredRecord {
    finish(RecordKind::MouseClick, pointer, |fields| push_button(fields, button))
}

pub fn key(pointer: PointerFields, key: KeyFields) -> StructuredRecord {
    finish(RecordKind::Key, pointer, |fields| {
        push_button(fields, key.button);
        fields.push(key.character.unwrap_or_default());
    })
}

pub fn touch(pointer: PointerFields, touch_id: i32) -> StructuredRecord {
    finish(RecordKind::Touch, pointer, |fields| fields.push(touch_id.to_string()))
}

pub fn barrier(pointer: PointerFields, barrier: BarrierFields) -> StructuredRecord {
    finish(RecordKind::Barrier, pointer, |fields| {
        fields.push(barrier.barrier_id.to_string());
        fields.push(barrier.event_id.to_string());
        fields.push(format_double(barrier.delta.0));
        fields.push(format_double(barrier.delta.1));
        fields.push(barrier.action.code().to_string());
    })
}

fn push_button(fields: &mut Vec<String>, button: ButtonFields) {
    fields.push(button.button_id.to_string());
    fields.push(button.button_name.unwrap_or_default());
    fields.push(button.action.code().to_string());
}

fn finish(
    kind: RecordKind,
    pointer: PointerFields,
    extend: impl FnOnce(&mut Vec<String>),
) -> StructuredRecord {
    let mut fields = Vec::with_capacity(kind.field_count());
    let (x, y) = pointer.position.unzip();
    let focus = pointer.focus;

    fields.push(format_interval(pointer.interval));
    fields.push(format_timestamp(pointer.timestamp));
    fields.push(format_optional(x.map(format_double)));
    fields.push(format_optional(y.map(format_double)));
    fields.push(pointer.device_name.unwrap_or_default());
    fields.push(focus.as_ref().and_then(|window| window.name.clone()).unwrap_or_default());
    fields.push(format_optional(focus.as_ref().map(|window| window.x)));
    fields.push(format_optional(focus.as_ref().map(|window| window.y)));
    fields.push(format_optional(focus.as_ref().map(|window| window.width)));
    fields.push(format_optional(focus.as_ref().map(|window| window.height)));
    fields.push(format_optional(pointer.screen));
    fields.push(pointer.device_type.code().to_string());
    extend(&mut fields);

    let modifiers = pointer
        .modifiers
        .iter()
        .map(|modifier| modifier.code().to_string())
        .collect();

    StructuredRecord::from_schema(kind, fields, modifiers)
}
