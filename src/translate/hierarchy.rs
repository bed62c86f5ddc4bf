//! Device hierarchy and device class changes.

use tracing::info;

use crate::error::TranslationError;
use crate::event::{code, HierarchyEvent, Payload, RawEvent};

/// Produces no records. Its output is the device change that the switch
/// broadcasts to every other translator.
#[derive(Debug, Clone, Default)]
pub struct HierarchyTranslator;

impl HierarchyTranslator {
    pub const CLAIMS: &'static [u16] = &[code::HIERARCHY_CHANGED, code::DEVICE_CHANGED];

    pub fn new() -> Self {
        Self
    }

    pub fn translate(&mut self, event: &RawEvent) -> Result<HierarchyEvent, TranslationError> {
        let Payload::Hierarchy(change) = &event.payload else {
            return Err(TranslationError::PayloadMismatch {
                event_type: event.event_type,
                expected: "hierarchy",
                found: event.payload.kind(),
            });
        };
        for removed in &change.removed {
            if change.added.iter().any(|info| info.id == *removed) {
                return Err(TranslationError::Malformed {
                    event_type: event.event_type,
                    reason: format!("device {removed} is both added and removed"),
                });
            }
        }

        for device in &change.added {
            info!(
                device = device.id,
                name = device.name.as_deref().unwrap_or(""),
                kind = device.device_type.name(),
                "input device available"
            );
        }
        Ok(change.clone())
    }
}
