//! Touch sequences.
//!
//! Every touch event yields a `Touch` record. Begin and end additionally
//! synthesize a press or release of button 1, always after the touch record.

use super::devices::{DeviceSet, IntervalTracker};
use super::{device_payload, pointer_fields};
use crate::error::TranslationError;
use crate::event::{code, HierarchyEvent, RawEvent};
use crate::record::builder::{self, ButtonFields};
use crate::record::{ButtonAction, RecordBatch};

/// A touch contact clicks as the primary button.
const TOUCH_BUTTON: i32 = 1;

#[derive(Debug, Clone)]
pub struct TouchTranslator {
    devices: DeviceSet,
    intervals: IntervalTracker,
}

impl TouchTranslator {
    pub const CLAIMS: &'static [u16] = &[
        code::RAW_TOUCH_BEGIN,
        code::RAW_TOUCH_UPDATE,
        code::RAW_TOUCH_END,
    ];

    pub fn new() -> Self {
        Self {
            devices: DeviceSet::new(|info| info.has_touch),
            intervals: IntervalTracker::new(),
        }
    }

    pub fn translate(&mut self, event: &RawEvent) -> Result<RecordBatch, TranslationError> {
        let raw = device_payload(event)?;
        let Some(device) = self.devices.get(raw.source_id) else {
            return Ok(RecordBatch::new());
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

        let action = match event.event_type {
            code::RAW_TOUCH_BEGIN => Some(ButtonAction::Press),
            code::RAW_TOUCH_END => Some(ButtonAction::Release),
            _ => None,
        };

        let mut batch = RecordBatch::from(builder::touch(fields.clone(), raw.detail));
        if let Some(action) = action {
            let button = ButtonFields {
                button_id: TOUCH_BUTTON,
                button_name: device.buttons.get(&TOUCH_BUTTON).cloned(),
                action,
            };
            batch.merge_with(builder::mouse_click(fields, button).into());
        }
        Ok(batch)
    }

    pub fn apply_device_change(&mut self, change: &HierarchyEvent) {
        self.devices.apply(change);
        for id in &change.removed {
            self.intervals.forget(*id);
        }
    }
}

impl Default for TouchTranslator {
    fn default() -> Self {
        Self::new()
    }
}
