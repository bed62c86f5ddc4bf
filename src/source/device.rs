//! Linux event devices (`/dev/input/eventN`).
//!
//! Devices are opened and enumerated through the `evdev` crate and read with
//! its tokio event stream, so an idle device parks its loop without holding
//! a worker. Kernel events are collected into frames up to `SYN_REPORT` and
//! each frame becomes raw motion, button, key and touch events. The first
//! event of every stream announces the device with its capabilities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evdev::{
    AbsoluteAxisCode, AttributeSet, Device, EventStream, EventType, InputEvent, KeyCode, PropType,
    RelativeAxisCode, SynchronizationCode,
};
use nix::errno::Errno;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::{OpenSource, Source};
use crate::error::SourceError;
use crate::event::{
    code, DeviceEvent, DeviceInfo, HierarchyEvent, KeySymbol, PointerAxes, PointerState, RawEvent,
    ScrollAxis, ScrollOrientation, KEY_REPEAT,
};
use crate::record::{DeviceType, Modifier};

/// Capture time and device clock (microseconds) of a kernel event.
pub fn event_clock(time: SystemTime) -> (DateTime<Utc>, u64) {
    let micros = time
        .duration_since(UNIX_EPOCH)
        .map(|since| u64::try_from(since.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    (DateTime::<Utc>::from(time), micros)
}

/// Groups kernel events into frames and turns each frame into raw events.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    device_id: i32,
    touch: bool,
    pending: Vec<InputEvent>,
    dropping: bool,
    modifiers: u32,
    position: Option<(f64, f64)>,
    touch_id: i32,
    touching: bool,
}

impl FrameDecoder {
    pub fn new(device_id: i32, touch: bool) -> Self {
        Self {
            device_id,
            touch,
            pending: Vec::new(),
            dropping: false,
            modifiers: 0,
            position: None,
            touch_id: 0,
            touching: false,
        }
    }

    /// Held modifiers as an X11 mask.
    pub fn modifiers(&self) -> u32 {
        self.modifiers
    }

    pub fn push(&mut self, event: InputEvent) -> Vec<RawEvent> {
        if event.event_type() != EventType::SYNCHRONIZATION {
            if !self.dropping {
                self.pending.push(event);
            }
            return Vec::new();
        }

        if event.code() == SynchronizationCode::SYN_REPORT.0 {
            let frame = mem::take(&mut self.pending);
            if mem::take(&mut self.dropping) {
                return Vec::new();
            }
            self.frame(&frame, &event)
        } else if event.code() == SynchronizationCode::SYN_DROPPED.0 {
            warn!(device = self.device_id, "kernel dropped input events, discarding frame");
            self.pending.clear();
            self.dropping = true;
            Vec::new()
        } else {
            Vec::new()
        }
    }

    fn frame(&mut self, events: &[InputEvent], report: &InputEvent) -> Vec<RawEvent> {
        let (timestamp, time) = event_clock(report.timestamp());
        let mut valuators = BTreeMap::new();
        let mut moved = false;

        for event in events {
            let value = event.value();
            if event.event_type() == EventType::RELATIVE {
                let Some(axis) = relative_valuator(RelativeAxisCode(event.code())) else {
                    continue;
                };
                *valuators.entry(axis).or_insert(0.0) += f64::from(value);
            } else if event.event_type() == EventType::ABSOLUTE {
                let axis = AbsoluteAxisCode(event.code());
                let (x, y) = self.position.unwrap_or_default();
                if axis == AbsoluteAxisCode::ABS_X || axis == AbsoluteAxisCode::ABS_MT_POSITION_X {
                    self.position = Some((f64::from(value), y));
                    valuators.insert(0, f64::from(value));
                    moved = true;
                } else if axis == AbsoluteAxisCode::ABS_Y
                    || axis == AbsoluteAxisCode::ABS_MT_POSITION_Y
                {
                    self.position = Some((x, f64::from(value)));
                    valuators.insert(1, f64::from(value));
                    moved = true;
                } else if axis == AbsoluteAxisCode::ABS_MT_TRACKING_ID && value >= 0 {
                    self.touch_id = value;
                }
            }
        }

        let mut out = Vec::new();
        let touch_motion = self.touch && self.touching;
        if !valuators.is_empty() && !touch_motion {
            out.push(RawEvent::device(
                code::RAW_MOTION,
                timestamp,
                DeviceEvent {
                    valuators,
                    ..self.base(time)
                },
            ));
        }

        let mut touch_edge = false;
        for event in events.iter().filter(|event| event.event_type() == EventType::KEY) {
            let key = KeyCode::new(event.code());
            if key == KeyCode::BTN_TOUCH {
                touch_edge = true;
                self.touching = event.value() != 0;
                let event_type = if self.touching {
                    code::RAW_TOUCH_BEGIN
                } else {
                    code::RAW_TOUCH_END
                };
                out.push(self.touch_event(event_type, timestamp, time));
            } else if is_key(key) {
                out.extend(self.key_event(key, event.value(), timestamp, time));
            } else if let Some(button) = button_number(key) {
                let event_type = match event.value() {
                    0 => code::RAW_BUTTON_RELEASE,
                    1 => code::RAW_BUTTON_PRESS,
                    _ => continue,
                };
                out.push(RawEvent::device(
                    event_type,
                    timestamp,
                    DeviceEvent {
                        detail: button,
                        ..self.base(time)
                    },
                ));
            }
        }

        if touch_motion && moved && !touch_edge {
            out.push(self.touch_event(code::RAW_TOUCH_UPDATE, timestamp, time));
        }
        out
    }

    fn key_event(
        &mut self,
        key: KeyCode,
        value: i32,
        timestamp: DateTime<Utc>,
        time: u64,
    ) -> Option<RawEvent> {
        let (event_type, flags) = match value {
            0 => (code::RAW_KEY_RELEASE, 0),
            1 => (code::RAW_KEY_PRESS, 0),
            2 => (code::RAW_KEY_PRESS, KEY_REPEAT),
            _ => return None,
        };
        let raw = DeviceEvent {
            detail: i32::from(key.code()),
            flags,
            key: key_symbol(key, self.modifiers),
            ..self.base(time)
        };
        if flags == 0 {
            self.update_modifiers(key, value == 1);
        }
        Some(RawEvent::device(event_type, timestamp, raw))
    }

    fn update_modifiers(&mut self, key: KeyCode, pressed: bool) {
        let Some(modifier) = modifier_for(key) else { return };
        let bit = modifier.mask_bit();
        match modifier {
            Modifier::CapsLock | Modifier::NumLock => {
                if pressed {
                    self.modifiers ^= bit;
                }
            }
            _ if pressed => self.modifiers |= bit,
            _ => self.modifiers &= !bit,
        }
    }

    fn touch_event(&self, event_type: u16, timestamp: DateTime<Utc>, time: u64) -> RawEvent {
        RawEvent::device(
            event_type,
            timestamp,
            DeviceEvent {
                detail: self.touch_id,
                ..self.base(time)
            },
        )
    }

    /// Device, clock, modifiers and pointer view shared by every event.
    fn base(&self, time: u64) -> DeviceEvent {
        DeviceEvent {
            device_id: self.device_id,
            source_id: self.device_id,
            time,
            modifiers: self.modifiers,
            pointer: self.position.map(|(root_x, root_y)| PointerState {
                root_x,
                root_y,
                screen: None,
            }),
            ..DeviceEvent::default()
        }
    }
}

/// Valuator number a relative axis reports on.
fn relative_valuator(axis: RelativeAxisCode) -> Option<u16> {
    [
        (RelativeAxisCode::REL_X, 0),
        (RelativeAxisCode::REL_Y, 1),
        (RelativeAxisCode::REL_HWHEEL, 2),
        (RelativeAxisCode::REL_WHEEL, 3),
    ]
    .into_iter()
    .find_map(|(code, valuator)| (code == axis).then_some(valuator))
}

fn is_key(key: KeyCode) -> bool {
    key.code() < KeyCode::BTN_0.code() /* BTN_MISC == BTN_0 == 0x100 */ || key.code() >= KeyCode::KEY_OK.code()
}

const BUTTONS: [(KeyCode, i32, &str); 7] = [
    (KeyCode::BTN_LEFT, 1, "Button Left"),
    (KeyCode::BTN_MIDDLE, 2, "Button Middle"),
    (KeyCode::BTN_RIGHT, 3, "Button Right"),
    (KeyCode::BTN_SIDE, 8, "Button Side"),
    (KeyCode::BTN_BACK, 8, "Button Back"),
    (KeyCode::BTN_EXTRA, 9, "Button Extra"),
    (KeyCode::BTN_FORWARD, 9, "Button Forward"),
];

/// X11 button number for a mouse button.
fn button_number(key: KeyCode) -> Option<i32> {
    BUTTONS
        .iter()
        .find_map(|(code, button, _)| (*code == key).then_some(*button))
}

fn modifier_for(key: KeyCode) -> Option<Modifier> {
    const MODIFIERS: [(KeyCode, Modifier); 10] = [
        (KeyCode::KEY_LEFTSHIFT, Modifier::Shift),
        (KeyCode::KEY_RIGHTSHIFT, Modifier::Shift),
        (KeyCode::KEY_CAPSLOCK, Modifier::CapsLock),
        (KeyCode::KEY_LEFTCTRL, Modifier::Control),
        (KeyCode::KEY_RIGHTCTRL, Modifier::Control),
        (KeyCode::KEY_LEFTALT, Modifier::Alt),
        (KeyCode::KEY_NUMLOCK, Modifier::NumLock),
        (KeyCode::KEY_LEFTMETA, Modifier::Super),
        (KeyCode::KEY_RIGHTMETA, Modifier::Super),
        (KeyCode::KEY_RIGHTALT, Modifier::Mod5),
    ];
    MODIFIERS
        .iter()
        .find_map(|(code, modifier)| (*code == key).then_some(*modifier))
}

const LETTER_ROWS: [(KeyCode, &str); 3] = [
    (KeyCode::KEY_Q, "qwertyuiop"),
    (KeyCode::KEY_A, "asdfghjkl"),
    (KeyCode::KEY_Z, "zxcvbnm"),
];

/// Printable keys of a US layout as (key, plain, shifted, keysym name).
const PRINTABLE: [(KeyCode, char, char, &str); 22] = [
    (KeyCode::KEY_1, '1', '!', "1"),
    (KeyCode::KEY_2, '2', '@', "2"),
    (KeyCode::KEY_3, '3', '#', "3"),
    (KeyCode::KEY_4, '4', '$', "4"),
    (KeyCode::KEY_5, '5', '%', "5"),
    (KeyCode::KEY_6, '6', '^', "6"),
    (KeyCode::KEY_7, '7', '&', "7"),
    (KeyCode::KEY_8, '8', '*', "8"),
    (KeyCode::KEY_9, '9', '(', "9"),
    (KeyCode::KEY_0, '0', ')', "0"),
    (KeyCode::KEY_MINUS, '-', '_', "minus"),
    (KeyCode::KEY_EQUAL, '=', '+', "equal"),
    (KeyCode::KEY_LEFTBRACE, '[', '{', "bracketleft"),
    (KeyCode::KEY_RIGHTBRACE, ']', '}', "bracketright"),
    (KeyCode::KEY_SEMICOLON, ';', ':', "semicolon"),
    (KeyCode::KEY_APOSTROPHE, '\'', '"', "apostrophe"),
    (KeyCode::KEY_GRAVE, '`', '~', "grave"),
    (KeyCode::KEY_BACKSLASH, '\\', '|', "backslash"),
    (KeyCode::KEY_COMMA, ',', '<', "comma"),
    (KeyCode::KEY_DOT, '.', '>', "period"),
    (KeyCode::KEY_SLASH, '/', '?', "slash"),
    (KeyCode::KEY_SPACE, ' ', ' ', "space"),
];

const NAMED: [(KeyCode, &str); 27] = [
    (KeyCode::KEY_ESC, "Escape"),
    (KeyCode::KEY_BACKSPACE, "BackSpace"),
    (KeyCode::KEY_TAB, "Tab"),
    (KeyCode::KEY_ENTER, "Return"),
    (KeyCode::KEY_LEFTCTRL, "Control_L"),
    (KeyCode::KEY_LEFTSHIFT, "Shift_L"),
    (KeyCode::KEY_RIGHTSHIFT, "Shift_R"),
    (KeyCode::KEY_LEFTALT, "Alt_L"),
    (KeyCode::KEY_CAPSLOCK, "Caps_Lock"),
    (KeyCode::KEY_NUMLOCK, "Num_Lock"),
    (KeyCode::KEY_RIGHTCTRL, "Control_R"),
    (KeyCode::KEY_RIGHTALT, "ISO_Level3_Shift"),
    (KeyCode::KEY_HOME, "Home"),
    (KeyCode::KEY_UP, "Up"),
    (KeyCode::KEY_PAGEUP, "Prior"),
    (KeyCode::KEY_LEFT, "Left"),
    (KeyCode::KEY_RIGHT, "Right"),
    (KeyCode::KEY_END, "End"),
    (KeyCode::KEY_DOWN, "Down"),
    (KeyCode::KEY_PAGEDOWN, "Next"),
    (KeyCode::KEY_INSERT, "Insert"),
    (KeyCode::KEY_DELETE, "Delete"),
    (KeyCode::KEY_LEFTMETA, "Super_L"),
    (KeyCode::KEY_RIGHTMETA, "Super_R"),
    (KeyCode::KEY_COMPOSE, "Menu"),
    (KeyCode::KEY_F11, "F11"),
    (KeyCode::KEY_F12, "F12"),
];

fn letter(key: KeyCode) -> Option<char> {
    LETTER_ROWS.iter().find_map(|(start, row)| {
        key.code()
            .checked_sub(start.code())
            .and_then(|offset| row.chars().nth(usize::from(offset)))
    })
}

fn named_key(key: KeyCode) -> Option<String> {
    if (KeyCode::KEY_F1.code()..=KeyCode::KEY_F10.code()).contains(&key.code()) {
        return Some(format!("F{}", key.code() - KeyCode::KEY_F1.code() + 1));
    }
    NAMED
        .iter()
        .find_map(|(code, name)| (*code == key).then(|| name.to_string()))
}

/// Key symbol for `key` under the held modifiers.
fn key_symbol(key: KeyCode, modifiers: u32) -> Option<KeySymbol> {
    let shift = modifiers & Modifier::Shift.mask_bit() != 0;
    let caps = modifiers & Modifier::CapsLock.mask_bit() != 0;

    if let Some(plain) = letter(key) {
        let typed = if shift != caps {
            plain.to_ascii_uppercase()
        } else {
            plain
        };
        return Some(KeySymbol {
            name: typed.to_string(),
            character: Some(typed.to_string()),
        });
    }
    if let Some((_, plain, shifted, name)) = PRINTABLE.iter().find(|(code, ..)| *code == key) {
        let typed = if shift { shifted } else { plain };
        return Some(KeySymbol {
            name: name.to_string(),
            character: Some(typed.to_string()),
        });
    }
    named_key(key).map(|name| KeySymbol {
        name,
        character: None,
    })
}

/// What an event device reports it can do.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub keys: AttributeSet<KeyCode>,
    pub relative: AttributeSet<RelativeAxisCode>,
    pub absolute: AttributeSet<AbsoluteAxisCode>,
    pub properties: AttributeSet<PropType>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self {
            keys: AttributeSet::new(),
            relative: AttributeSet::new(),
            absolute: AttributeSet::new(),
            properties: AttributeSet::new(),
        }
    }

    pub fn of(device: &Device) -> Self {
        Self {
            keys: device
                .supported_keys()
                .map(|keys| keys.iter().collect())
                .unwrap_or_default(),
            relative: device
                .supported_relative_axes()
                .map(|axes| axes.iter().collect())
                .unwrap_or_default(),
            absolute: device
                .supported_absolute_axes()
                .map(|axes| axes.iter().collect())
                .unwrap_or_default(),
            properties: device.properties().iter().collect(),
        }
    }

    pub fn has_touch(&self) -> bool {
        self.keys.contains(KeyCode::BTN_TOUCH)
            && (self.absolute.contains(AbsoluteAxisCode::ABS_X)
                || self.absolute.contains(AbsoluteAxisCode::ABS_MT_POSITION_X))
    }

    pub fn has_keys(&self) -> bool {
        self.keys
            .iter()
            .any(|key| key != KeyCode::KEY_RESERVED && key.code() < KeyCode::BTN_0.code() /* BTN_MISC == BTN_0 == 0x100 */)
    }

    fn relative_pointer(&self) -> bool {
        self.relative.contains(RelativeAxisCode::REL_X)
            && self.relative.contains(RelativeAxisCode::REL_Y)
    }

    fn absolute_pointer(&self) -> bool {
        let abs = &self.absolute;
        (abs.contains(AbsoluteAxisCode::ABS_X) && abs.contains(AbsoluteAxisCode::ABS_Y))
            || (abs.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                && abs.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y))
    }

    pub fn device_type(&self) -> DeviceType {
        if self.has_touch() {
            if self.properties.contains(PropType::DIRECT) {
                DeviceType::Touchscreen
            } else {
                DeviceType::Touchpad
            }
        } else if self.relative_pointer() {
            DeviceType::Mouse
        } else if self.keys.contains(KeyCode::KEY_A) {
            DeviceType::Keyboard
        } else {
            DeviceType::Unknown
        }
    }

    pub fn device_info(&self, id: i32, name: Option<String>) -> DeviceInfo {
        let mut info = DeviceInfo::new(id, self.device_type());
        info.name = name;
        if self.relative_pointer() || self.absolute_pointer() {
            info.pointer_axes = Some(PointerAxes { x: 0, y: 1 });
        }
        if self.relative.contains(RelativeAxisCode::REL_HWHEEL) {
            info.scroll_axes.push(ScrollAxis {
                valuator: 2,
                orientation: ScrollOrientation::Horizontal,
            });
        }
        if self.relative.contains(RelativeAxisCode::REL_WHEEL) {
            info.scroll_axes.push(ScrollAxis {
                valuator: 3,
                orientation: ScrollOrientation::Vertical,
            });
        }
        for (code, button, label) in BUTTONS {
            if self.keys.contains(code) {
                info.buttons.entry(button).or_insert_with(|| label.to_string());
            }
        }
        info.has_keys = self.has_keys();
        info.has_touch = self.has_touch();
        info
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity and capabilities of an event device node.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceProbe {
    pub path: PathBuf,
    pub id: i32,
    pub name: Option<String>,
    pub device_type: DeviceType,
    #[serde(skip)]
    pub capabilities: Capabilities,
}

impl DeviceProbe {
    pub fn new(path: &Path, device: &Device) -> Self {
        let capabilities = Capabilities::of(device);
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(event_number)
            .unwrap_or(0);
        Self {
            path: path.to_path_buf(),
            id,
            name: device.name().map(str::to_string).filter(|name| !name.is_empty()),
            device_type: capabilities.device_type(),
            capabilities,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.capabilities.device_info(self.id, self.name.clone())
    }
}

fn event_number(file_name: &str) -> Option<i32> {
    file_name.strip_prefix("event")?.parse().ok()
}

/// Every event device this process can open, in node order.
pub fn list_event_devices() -> Vec<DeviceProbe> {
    let mut devices: Vec<DeviceProbe> = evdev::enumerate()
        .map(|(path, device)| DeviceProbe::new(&path, &device))
        .collect();
    devices.sort_by_key(|probe| probe.id);
    devices
}

/// The device node is gone, which ends the stream rather than failing it.
fn is_unplugged(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::ENODEV as i32)
}

/// An event device node that has not been opened yet.
#[derive(Debug, Clone)]
pub struct EventDevice {
    path: PathBuf,
}

impl EventDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OpenSource for EventDevice {
    fn name(&self) -> String {
        format!("evdev:{}", self.path.display())
    }

    async fn open(self: Box<Self>) -> Result<Box<dyn Source>, SourceError> {
        let name = self.name();
        let path = self.path.clone();
        let (device, probe) = tokio::task::spawn_blocking(move || -> io::Result<(Device, DeviceProbe)> {
            let device = Device::open(&path)?;
            let probe = DeviceProbe::new(&path, &device);
            Ok((device, probe))
        })
        .await
        .map_err(|err| SourceError::open(name.clone(), io::Error::other(err)))?
        .map_err(|err| SourceError::open(name.clone(), err))?;
        let stream = device
            .into_event_stream()
            .map_err(|err| SourceError::open(name.clone(), err))?;

        let info = probe.device_info();
        info!(
            source = %name,
            device = info.name.as_deref().unwrap_or("unnamed"),
            device_type = info.device_type.name(),
            "event device opened"
        );
        let decoder = FrameDecoder::new(info.id, info.has_touch);
        let announce = RawEvent::hierarchy(
            Utc::now(),
            HierarchyEvent {
                added: vec![info],
                removed: vec![],
            },
        );

        Ok(Box::new(EventDeviceSource {
            name,
            stream,
            decoder,
            ready: VecDeque::from([announce]),
        }))
    }
}

pub struct EventDeviceSource {
    name: String,
    stream: EventStream,
    decoder: FrameDecoder,
    ready: VecDeque<RawEvent>,
}

#[async_trait]
impl Source for EventDeviceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            match self.stream.next_event().await {
                Ok(event) => self.ready.extend(self.decoder.push(event)),
                Err(err) if is_unplugged(&err) => {
                    info!(source = %self.name, "device removed");
                    return Ok(None);
                }
                Err(err) => return Err(SourceError::io(self.name.clone(), err)),
            }
        }
    }

    async fn close(&mut self) {
        debug!(source = %self.name, pending = self.ready.len(), "closing event device");
        self.ready.clear();
    }
}
