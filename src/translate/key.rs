//! Key presses, releases and auto-repeats.

use super::devices::{DeviceSet, IntervalTracker};
use super::{device_payload, pointer_fields};
use crate::error::TranslationError;
use crate::event::{code, HierarchyEvent, RawEvent};
use crate::record::builder::{self, ButtonFields, KeyFields};
use crate::record::{ButtonAction, RecordBatch};

#[derive(Debug, Clone)]
pub struct KeyTranslator {
    devices: DeviceSet,
    intervals: IntervalTracker,
}

impl KeyTranslator {
    pub const CLAIMS: &'static [u16] = &[code::RAW_KEY_PRESS, code::RAW_KEY_RELEASE];

    pub fn new() -> Self {
        Self {
            devices: DeviceSet::new(|info| info.has_keys),
            intervals: IntervalTracker::new(),
        }
    }

    pub fn translate(&mut self, event: &RawEvent) -> Result<RecordBatch, TranslationError> {
        let raw = device_payload(event)?;
        let Some(device) = self.devices.get(raw.source_id) else {
            return Ok(RecordBatch::new());
        };

        let action = if event.event_type == code::RAW_KEY_RELEASE {
            ButtonAction::Release
        } else if raw.is_key_repeat() {
            ButtonAction::Repeat
        } else {
            ButtonAction::Press
        };
        let symbol = raw.key.as_ref();
        let key = KeyFields {
            button: ButtonFields {
                button_id: raw.detail,
                button_name: symbol.map(|symbol| symbol.name.clone()),
                action,
            },
            character: symbol.and_then(|symbol| symbol.character.clone()),
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

        Ok(builder::key(fields, key).into())
    }

    pub fn apply_device_change(&mut self, change: &HierarchyEvent) {
        self.devices.apply(change);
        for id in &change.removed {
            self.intervals.forget(*id);
        }
    }
}

impl Default for KeyTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceEvent, KeySymbol, PointerState, KEY_REPEAT};
    use crate::record::{field, Modifier, RecordKind};
    use crate::translate::testing::*;

    fn key(event_type: u16, flags: u32, time: u64) -> RawEvent {
        RawEvent::device(
            event_type,
            at(4),
            DeviceEvent {
                detail: 38,
                flags,
                key: Some(KeySymbol {
                    name: "a".to_string(),
                    character: Some("A".to_string()),
                }),
                modifiers: Modifier::Shift.mask_bit(),
                pointer: Some(PointerState {
                    root_x: 1.0,
                    root_y: 2.0,
                    screen: Some(0),
                }),
                ..device_event(3, time)
            },
        )
    }

    fn translator() -> KeyTranslator {
        let mut translator = KeyTranslator::new();
        translator.apply_device_change(&added(vec![keyboard(3), mouse(2)]));
        translator
    }

    #[test]
    fn test_key_record() {
        let mut translator = translator();

        let batch = translator.translate(&key(code::RAW_KEY_PRESS, 0, 10)).unwrap();

        let record = &batch.records()[0];
        assert_eq!(record.kind(), RecordKind::Key);
        assert_eq!(record.fields()[field::BUTTON_ID], "38");
        assert_eq!(record.fields()[field::BUTTON_NAME], "a");
        assert_eq!(record.fields()[field::BUTTON_ACTION], "0");
        assert_eq!(record.fields()[field::CHARACTER], "A");
        assert_eq!(record.fields()[field::SCREEN], "0");
        assert_eq!(record.fields()[field::DEVICE_TYPE], "1");
        assert_eq!(record.modifiers(), &["0".to_string()]);
    }

    #[test]
    fn test_key_actions() {
        let mut translator = translator();
        let action = |batch: RecordBatch| batch.records()[0].fields()[field::BUTTON_ACTION].clone();

        assert_eq!(action(translator.translate(&key(code::RAW_KEY_PRESS, KEY_REPEAT, 1)).unwrap()), "2");
        assert_eq!(action(translator.translate(&key(code::RAW_KEY_RELEASE, 0, 2)).unwrap()), "1");
        assert_eq!(
            action(translator.translate(&key(code::RAW_KEY_RELEASE, KEY_REPEAT, 3)).unwrap()),
            "1"
        );
    }

    #[test]
    fn test_missing_symbol_leaves_fields_empty() {
        let mut translator = translator();
        let mut event = key(code::RAW_KEY_PRESS, 0, 1);
        if let crate::event::Payload::Device(raw) = &mut event.payload {
            raw.key = None;
        }

        let batch = translator.translate(&event).unwrap();

        assert_eq!(batch.records()[0].fields()[field::BUTTON_NAME], "");
        assert_eq!(batch.records()[0].fields()[field::CHARACTER], "");
    }

    #[test]
    fn test_ignores_non_keyboards() {
        let mut translator = translator();
        let mut event = key(code::RAW_KEY_PRESS, 0, 1);
        if let crate::event::Payload::Device(raw) = &mut event.payload {
            raw.source_id = 2;
        }
        assert!(translator.translate(&event).unwrap().is_empty());
    }
}
