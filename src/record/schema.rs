//! Compiled-in schema registry.
//!
//! Every record kind has a fixed, ordered list of fields. Kinds derived from
//! pointer events share the twelve-field `MouseMove` prefix and append their
//! own fields after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::values::{BarrierAction, ButtonAction, DeviceType};

/// Timestamp layout used for the `timestamp` field.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%z";

/// Kind of a structured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Key,
    MouseClick,
    MouseMove,
    MouseScroll,
    Touch,
    Barrier,
}

/// How a coded field is turned into its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coding {
    DeviceType,
    ButtonAction,
    BarrierAction,
}

impl Coding {
    /// Name for an encoded value, if the value is a known code.
    pub fn name_of(self, encoded: &str) -> Option<&'static str> {
        let code: u8 = encoded.parse().ok()?;
        match self {
            Coding::DeviceType => DeviceType::from_code(code).map(DeviceType::name),
            Coding::ButtonAction => ButtonAction::from_code(code).map(ButtonAction::name),
            Coding::BarrierAction => BarrierAction::from_code(code).map(BarrierAction::name),
        }
    }
}

/// One column of a record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub coding: Option<Coding>,
}

impl FieldSpec {
    const fn plain(name: &'static str) -> Self {
        Self { name, coding: None }
    }

    const fn coded(name: &'static str, coding: Coding) -> Self {
        Self {
            name,
            coding: Some(coding),
        }
    }
}

macro_rules! pointer_schema {
    ($($extra:expr),* $(,)?) => {
        &[
            FieldSpec::plain("interval"),
            FieldSpec::plain("timestamp"),
            FieldSpec::plain("position_x"),
            FieldSpec::plain("position_y"),
            FieldSpec::plain("device_name"),
            FieldSpec::plain("focus_window_name"),
            FieldSpec::plain("focus_window_position_x"),
            FieldSpec::plain("focus_window_position_y"),
            FieldSpec::plain("focus_window_width"),
            FieldSpec::plain("focus_window_height"),
            FieldSpec::plain("screen"),
            FieldSpec::coded("device_type", Coding::DeviceType),
            $($extra,)*
        ]
    };
}

const MOUSE_MOVE: &[FieldSpec] = pointer_schema![];

const MOUSE_SCROLL: &[FieldSpec] = pointer_schema![
    FieldSpec::plain("scroll_vertical"),
    FieldSpec::plain("scroll_horizontal"),
];

const MOUSE_CLICK: &[FieldSpec] = pointer_schema![
    FieldSpec::plain("button_id"),
    FieldSpec::plain("button_name"),
    FieldSpec::coded("button_action", Coding::ButtonAction),
];

const KEY: &[FieldSpec] = pointer_schema![
    FieldSpec::plain("button_id"),
    FieldSpec::plain("button_name"),
    FieldSpec::coded("button_action", Coding::ButtonAction),
    FieldSpec::plain("character"),
];

const TOUCH: &[FieldSpec] = pointer_schema![FieldSpec::plain("touch_id")];

const BARRIER: &[FieldSpec] = pointer_schema![
    FieldSpec::plain("barrier_id"),
    FieldSpec::plain("barrier_event_id"),
    FieldSpec::plain("delta_x"),
    FieldSpec::plain("delta_y"),
    FieldSpec::coded("barrier_action", Coding::BarrierAction),
];

/// Positions of fields within a record.
pub mod field {
    pub const INTERVAL: usize = 0;
    pub const TIMESTAMP: usize = 1;
    pub const POSITION_X: usize = 2;
    pub const POSITION_Y: usize = 3;
    pub const DEVICE_NAME: usize = 4;
    pub const FOCUS_WINDOW_NAME: usize = 5;
    pub const FOCUS_WINDOW_POSITION_X: usize = 6;
    pub const FOCUS_WINDOW_POSITION_Y: usize = 7;
    pub const FOCUS_WINDOW_WIDTH: usize = 8;
    pub const FOCUS_WINDOW_HEIGHT: usize = 9;
    pub const SCREEN: usize = 10;
    pub const DEVICE_TYPE: usize = 11;

    pub const SCROLL_VERTICAL: usize = 12;
    pub const SCROLL_HORIZONTAL: usize = 13;

    pub const BUTTON_ID: usize = 12;
    pub const BUTTON_NAME: usize = 13;
    pub const BUTTON_ACTION: usize = 14;
    pub const CHARACTER: usize = 15;

    pub const TOUCH_ID: usize = 12;

    pub const BARRIER_ID: usize = 12;
    pub const BARRIER_EVENT_ID: usize = 13;
    pub const DELTA_X: usize = 14;
    pub const DELTA_Y: usize = 15;
    pub const BARRIER_ACTION: usize = 16;
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Key,
        RecordKind::MouseClick,
        RecordKind::MouseMove,
        RecordKind::MouseScroll,
        RecordKind::Touch,
        RecordKind::Barrier,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Key => "Key",
            RecordKind::MouseClick => "MouseClick",
            RecordKind::MouseMove => "MouseMove",
            RecordKind::MouseScroll => "MouseScroll",
            RecordKind::Touch => "Touch",
            RecordKind::Barrier => "Barrier",
        }
    }

    /// Ordered field specifications for this kind.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            RecordKind::Key => KEY,
            RecordKind::MouseClick => MOUSE_CLICK,
            RecordKind::MouseMove => MOUSE_MOVE,
            RecordKind::MouseScroll => MOUSE_SCROLL,
            RecordKind::Touch => TOUCH,
            RecordKind::Barrier => BARRIER,
        }
    }

    pub fn field_count(self) -> usize {
        self.fields().len()
    }

    pub fn field_names(self) -> impl Iterator<Item = &'static str> {
        self.fields().iter().map(|spec| spec.name)
    }

    pub fn field_index(self, name: &str) -> Option<usize> {
        self.fields().iter().position(|spec| spec.name == name)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode a floating point value with six fractional digits.
pub fn format_double(value: f64) -> String {
    format!("{value:.6}")
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Encode an interval as whole microseconds, or the empty sentinel.
pub fn format_interval(interval: Option<Duration>) -> String {
    interval
        .map(|interval| interval.as_micros().to_string())
        .unwrap_or_default()
}

/// Encode an optional value, or the empty sentinel when it was not observed.
pub fn format_optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}
