//! Pointer button presses and releases.

use super::devices::{DeviceSet, IntervalTracker};
use super::{device_payload, pointer_fields};
use crate::error::TranslationError;
use crate::event::{code, HierarchyEvent, RawEvent};
use crate::record::builder::{self, ButtonFields};
use crate::record::{ButtonAction, RecordBatch};

/// Button labels that stand for wheel movement. Wheel motion is recorded from
/// scroll valuators, so these buttons are skipped.
const WHEEL_LABELS: [&str; 4] = [
    "Button Wheel Up",
    "Button Wheel Down",
    "Button Horiz Wheel Left",
    "Button Horiz Wheel Right",
];

#[derive(Debug, Clone)]
pub struct ButtonTranslator {
    devices: DeviceSet,
    intervals: IntervalTracker,
}

impl ButtonTranslator {
    pub const CLAIMS: &'static [u16] = &[code::RAW_BUTTON_PRESS, code::RAW_BUTTON_RELEASE];

    pub fn new() -> Self {
        Self {
            devices: DeviceSet::new(|info| info.has_buttons() || info.has_pointer()),
            intervals: IntervalTracker::new(),
        }
    }

    pub fn translate(&mut self, event: &RawEvent) -> Result<RecordBatch, TranslationError> {
        let raw = device_payload(event)?;
        let Some(device) = self.devices.get(raw.source_id) else {
            return Ok(RecordBatch::new());
        };
        if raw.is_pointer_emulated() {
            return Ok(RecordBatch::new());
        }
        let label = device.buttons.get(&raw.detail);
        if label.is_some_and(|label| WHEEL_LABELS.contains(&label.as_str())) {
            return Ok(RecordBatch::new());
        }

        let action = if event.event_type == code::RAW_BUTTON_RELEASE {
            ButtonAction::Release
        } else {
            ButtonAction::Press
        };
        let button = ButtonFields {
            button_id: raw.detail,
            button_name: label.cloned(),
            action,
        };
        let interval = self.intervals.interval(raw.source_id, raw.time);
        let fields = pointer_fields(
            event.timestamp,
            device,
            raw.pointer.as_ref(),
            raw.focus.as_ref(),
            raw.modifiers,
            interval,
        );

        Ok(builder::mouse_click(fields, button).into())
    }

    pub fn apply_device_change(&mut self, change: &HierarchyEvent) {
        self.devices.apply(change);
        for id in &change.removed {
            self.intervals.forget(*id);
        }
    }
}

impl Default for ButtonTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceEvent, POINTER_EMULATED};
    use crate::record::{field, RecordKind};
    use crate::translate::testing::*;

    fn translator() -> ButtonTranslator {
        let mut translator = ButtonTranslator::new();
        translator.apply_device_change(&added(vec![mouse(2)]));
        translator
    }

    fn button(event_type: u16, detail: i32, flags: u32) -> RawEvent {
        RawEvent::device(
            event_type,
            at(3),
            DeviceEvent {
                detail,
                flags,
                ..device_event(2, 50)
            },
        )
    }

    #[test]
    fn test_press_and_release() {
        let mut translator = translator();

        let press = translator.translate(&button(code::RAW_BUTTON_PRESS, 1, 0)).unwrap();
        let release = translator.translate(&button(code::RAW_BUTTON_RELEASE, 1, 0)).unwrap();

        let press = &press.records()[0];
        assert_eq!(press.kind(), RecordKind::MouseClick);
        assert_eq!(press.fields()[field::BUTTON_ID], "1");
        assert_eq!(press.fields()[field::BUTTON_NAME], "Button Left");
        assert_eq!(press.fields()[field::BUTTON_ACTION], "0");
        let release = &release.records()[0];
        assert_eq!(release.fields()[field::BUTTON_ACTION], "1");
        assert_eq!(release.fields()[field::INTERVAL], "0");
    }

    #[test]
    fn test_unlabelled_button_has_empty_name() {
        let mut translator = translator();
        let batch = translator.translate(&button(code::RAW_BUTTON_PRESS, 8, 0)).unwrap();
        assert_eq!(batch.records()[0].fields()[field::BUTTON_NAME], "");
    }

    #[test]
    fn test_skips_wheel_and_emulated_buttons() {
        let mut translator = translator();
        assert!(translator
            .translate(&button(code::RAW_BUTTON_PRESS, 4, 0))
            .unwrap()
            .is_empty());
        assert!(translator
            .translate(&button(code::RAW_BUTTON_PRESS, 1, POINTER_EMULATED))
            .unwrap()
            .is_empty());
    }
}
