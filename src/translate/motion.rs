//! Pointer motion and scroll valuators.

use std::collections::BTreeMap;

use super::devices::{DeviceSet, IntervalTracker};
use super::{device_payload, pointer_fields};
use crate::error::TranslationError;
use crate::event::{code, DeviceInfo, HierarchyEvent, RawEvent, ScrollOrientation};
use crate::record::builder::{self, ScrollFields};
use crate::record::RecordBatch;

/// Turns raw motion into a `MouseMove` record and, when scroll axes moved,
/// a `MouseScroll` record sharing the same interval.
#[derive(Debug, Clone)]
pub struct MotionTranslator {
    devices: DeviceSet,
    intervals: IntervalTracker,
}

impl MotionTranslator {
    pub const CLAIMS: &'static [u16] = &[code::RAW_MOTION];

    pub fn new() -> Self {
        Self {
            devices: DeviceSet::new(|info| info.has_pointer() || info.has_scroll()),
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

        let mut batch = RecordBatch::new();
        let moved = device.pointer_axes.is_some_and(|axes| {
            raw.valuators.contains_key(&axes.x) || raw.valuators.contains_key(&axes.y)
        });
        if moved {
            batch.push(builder::mouse_move(fields.clone()));
        }
        if let Some(scroll) = scroll_fields(device, &raw.valuators) {
            batch.merge_with(builder::mouse_scroll(fields, scroll).into());
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

impl Default for MotionTranslator {
    fn default() -> Self {
        Self::new()
    }
}

fn scroll_fields(device: &DeviceInfo, valuators: &BTreeMap<u16, f64>) -> Option<ScrollFields> {
    let mut scroll = ScrollFields::default();
    let mut scrolled = false;
    for axis in &device.scroll_axes {
        let Some(value) = valuators.get(&axis.valuator) else { continue };
        match axis.orientation {
            ScrollOrientation::Vertical => scroll.vertical = Some(*value),
            ScrollOrientation::Horizontal => scroll.horizontal = Some(*value),
        }
        scrolled = true;
    }
    scrolled.then_some(scroll)
}
