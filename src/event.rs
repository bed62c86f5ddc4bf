//! Raw events as delivered by sources.
//!
//! A raw event is a type code plus a payload view. Codes follow the XInput2
//! numbering so captures from a display server and from event devices share
//! one vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::DeviceType;

/// Event type codes.
pub mod code {
    pub const DEVICE_CHANGED: u16 = 1;
    pub const HIERARCHY_CHANGED: u16 = 11;
    pub const RAW_KEY_PRESS: u16 = 13;
    pub const RAW_KEY_RELEASE: u16 = 14;
    pub const RAW_BUTTON_PRESS: u16 = 15;
    pub const RAW_BUTTON_RELEASE: u16 = 16;
    pub const RAW_MOTION: u16 = 17;
    pub const RAW_TOUCH_BEGIN: u16 = 22;
    pub const RAW_TOUCH_UPDATE: u16 = 23;
    pub const RAW_TOUCH_END: u16 = 24;
    pub const BARRIER_HIT: u16 = 25;
    pub const BARRIER_LEAVE: u16 = 26;
}

/// Flag bit set on button events that were emulated from another event.
pub const POINTER_EMULATED: u32 = 1 << 16;
/// Flag bit set on key events generated by auto-repeat.
pub const KEY_REPEAT: u32 = 1 << 16;

/// One unprocessed input occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_type: u16,
    /// Wall-clock time at which the event was captured.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: Payload,
}

impl RawEvent {
    pub fn new(event_type: u16, timestamp: DateTime<Utc>, payload: Payload) -> Self {
        Self {
            event_type,
            timestamp,
            payload,
        }
    }

    pub fn device(event_type: u16, timestamp: DateTime<Utc>, event: DeviceEvent) -> Self {
        Self::new(event_type, timestamp, Payload::Device(event))
    }

    pub fn hierarchy(timestamp: DateTime<Utc>, event: HierarchyEvent) -> Self {
        Self::new(code::HIERARCHY_CHANGED, timestamp, Payload::Hierarchy(event))
    }
}

/// Payload attached to a raw event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Device(DeviceEvent),
    Barrier(BarrierEvent),
    Hierarchy(HierarchyEvent),
    #[default]
    Empty,
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Device(_) => "device",
            Payload::Barrier(_) => "barrier",
            Payload::Hierarchy(_) => "hierarchy",
            Payload::Empty => "empty",
        }
    }
}

/// Key, button, motion or touch data from one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_id: i32,
    pub source_id: i32,
    /// Device clock in microseconds.
    pub time: u64,
    /// Button number, keycode or touch id, depending on the event type.
    #[serde(default)]
    pub detail: i32,
    #[serde(default)]
    pub flags: u32,
    /// Axis number to value.
    #[serde(default)]
    pub valuators: BTreeMap<u16, f64>,
    /// X11 modifier mask.
    #[serde(default)]
    pub modifiers: u32,
    #[serde(default)]
    pub pointer: Option<PointerState>,
    #[serde(default)]
    pub focus: Option<FocusWindow>,
    #[serde(default)]
    pub key: Option<KeySymbol>,
}

impl DeviceEvent {
    pub fn is_pointer_emulated(&self) -> bool {
        self.flags & POINTER_EMULATED != 0
    }

    pub fn is_key_repeat(&self) -> bool {
        self.flags & KEY_REPEAT != 0
    }
}

/// Pointer position at capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerState {
    pub root_x: f64,
    pub root_y: f64,
    #[serde(default)]
    pub screen: Option<i32>,
}

/// Window holding input focus at capture time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusWindow {
    #[serde(default)]
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Symbol a keycode resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySymbol {
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
}

/// Pointer barrier crossing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarrierEvent {
    pub device_id: i32,
    pub source_id: i32,
    pub time: u64,
    pub barrier: u32,
    pub event_id: u32,
    pub root_x: f64,
    pub root_y: f64,
    pub dx: f64,
    pub dy: f64,
    #[serde(default)]
    pub modifiers: u32,
    #[serde(default)]
    pub pointer: Option<PointerState>,
    #[serde(default)]
    pub focus: Option<FocusWindow>,
}

/// Devices that appeared, changed or went away.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEvent {
    #[serde(default)]
    pub added: Vec<DeviceInfo>,
    #[serde(default)]
    pub removed: Vec<i32>,
}

/// Description of one input device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub pointer_axes: Option<PointerAxes>,
    #[serde(default)]
    pub scroll_axes: Vec<ScrollAxis>,
    /// Button number to label.
    #[serde(default)]
    pub buttons: BTreeMap<i32, String>,
    #[serde(default)]
    pub has_keys: bool,
    #[serde(default)]
    pub has_touch: bool,
}

impl DeviceInfo {
    pub fn new(id: i32, device_type: DeviceType) -> Self {
        Self {
            id,
            device_type,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn has_pointer(&self) -> bool {
        self.pointer_axes.is_some()
    }

    pub fn has_scroll(&self) -> bool {
        !self.scroll_axes.is_empty()
    }

    pub fn has_buttons(&self) -> bool {
        !self.buttons.is_empty()
    }
}

/// Valuators carrying the x and y position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerAxes {
    pub x: u16,
    pub y: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollOrientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollAxis {
    pub valuator: u16,
    pub orientation: ScrollOrientation,
}
