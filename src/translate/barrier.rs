//! Pointer barrier hits and leaves.

use super::devices::{DeviceSet, IntervalTracker};
use super::pointer_fields;
use crate::error::TranslationError;
use crate::event::{code, BarrierEvent, HierarchyEvent, Payload, RawEvent};
use crate::record::builder::{self, BarrierFields};
use crate::record::{BarrierAction, RecordBatch};

#[derive(Debug, Clone)]
pub struct BarrierTranslator {
    devices: DeviceSet,
    intervals: IntervalTracker,
}

impl BarrierTranslator {
    pub const CLAIMS: &'static [u16] = &[code::BARRIER_HIT, code::BARRIER_LEAVE];

    pub fn new() -> Self {
        Self {
            devices: DeviceSet::new(|_| true),
            intervals: IntervalTracker::new(),
        }
    }

    pub fn translate(&mut self, event: &RawEvent) -> Result<RecordBatch, TranslationError> {
        let raw = barrier_payload(event)?;
        let Some(device) = self.devices.get(raw.device_id) else {
            return Ok(RecordBatch::new());
        };

        let action = if event.event_type == code::BARRIER_LEAVE {
            BarrierAction::Leave
        } else {
            BarrierAction::Hit
        };
        let interval = self.intervals.interval(raw.device_id, raw.time);
        let mut fields = pointer_fields(
            event.timestamp,
            device,
            raw.pointer.as_ref(),
            raw.focus.as_ref(),
            raw.modifiers,
            interval,
        );
        fields.position = Some((raw.root_x, raw.root_y));

        let barrier = BarrierFields {
            barrier_id: raw.barrier,
            event_id: raw.event_id,
            delta: (raw.dx, raw.dy),
            action,
        };
        Ok(builder::barrier(fields, barrier).into())
    }

    pub fn apply_device_change(&mut self, change: &HierarchyEvent) {
        self.devices.apply(change);
        for id in &change.removed {
            self.intervals.forget(*id);
        }
    }
}

impl Default for BarrierTranslator {
    fn default() -> Self {
        Self::new()
    }
}

fn barrier_payload(event: &RawEvent) -> Result<&BarrierEvent, TranslationError> {
    match &event.payload {
        Payload::Barrier(barrier) => Ok(barrier),
        other => Err(TranslationError::PayloadMismatch {
            event_type: event.event_type,
            expected: "barrier",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceEvent;
    use crate::record::{field, RecordKind};
    use crate::translate::testing::*;

    fn barrier(event_type: u16, time: u64) -> RawEvent {
        RawEvent::new(
            event_type,
            at(6),
            Payload::Barrier(BarrierEvent {
                device_id: 2,
                source_id: 9,
                time,
                barrier: 12,
                event_id: 3,
                root_x: 0.0,
                root_y: 540.0,
                dx: -4.0,
                dy: 0.25,
                modifiers: 0,
                pointer: None,
                focus: None,
            }),
        )
    }

    fn translator() -> BarrierTranslator {
        let mut translator = BarrierTranslator::new();
        translator.apply_device_change(&added(vec![mouse(2)]));
        translator
    }

    #[test]
    fn test_barrier_hit() {
        let mut translator = translator();

        let batch = translator.translate(&barrier(code::BARRIER_HIT, 100)).unwrap();

        let record = &batch.records()[0];
        assert_eq!(record.kind(), RecordKind::Barrier);
        assert_eq!(record.fields()[field::POSITION_X], "0.000000");
        assert_eq!(record.fields()[field::POSITION_Y], "540.000000");
        assert_eq!(record.fields()[field::BARRIER_ID], "12");
        assert_eq!(record.fields()[field::BARRIER_EVENT_ID], "3");
        assert_eq!(record.fields()[field::DELTA_X], "-4.000000");
        assert_eq!(record.fields()[field::DELTA_Y], "0.250000");
        assert_eq!(record.fields()[field::BARRIER_ACTION], "0");
    }

    #[test]
    fn test_barrier_leave_interval() {
        let mut translator = translator();
        translator.translate(&barrier(code::BARRIER_HIT, 100)).unwrap();

        let batch = translator.translate(&barrier(code::BARRIER_LEAVE, 160)).unwrap();

        assert_eq!(batch.records()[0].fields()[field::BARRIER_ACTION], "1");
        assert_eq!(batch.records()[0].fields()[field::INTERVAL], "60");
    }

    #[test]
    fn test_device_payload_is_malformed() {
        let mut translator = translator();
        let event = RawEvent::device(code::BARRIER_HIT, at(0), DeviceEvent::default());

        let err = translator.translate(&event).unwrap_err();

        assert_eq!(
            err,
            TranslationError::PayloadMismatch {
                event_type: code::BARRIER_HIT,
                expected: "barrier",
                found: "device",
            }
        );
    }
}
