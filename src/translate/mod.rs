//! Translation of raw events into structured records.
//!
//! [`EventSwitch`] holds an ordered list of translators. A raw event goes to
//! the first translator that claims its type code and to no other; an event
//! no translator claims is dropped. Translation failures are logged and the
//! event is dropped, so nothing escapes [`EventSwitch::dispatch`].
//!
//! Each source loop owns its own switch, so translator state is never shared
//! between sources.

pub mod barrier;
pub mod button;
pub mod devices;
pub mod hierarchy;
pub mod key;
pub mod motion;
pub mod touch;

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{trace, warn};

use crate::error::TranslationError;
use crate::event::{DeviceEvent, DeviceInfo, FocusWindow, HierarchyEvent, Payload, PointerState, RawEvent};
use crate::record::builder::PointerFields;
use crate::record::{Modifier, RecordBatch};
use crate::stats::SharedStats;

pub use barrier::BarrierTranslator;
pub use button::ButtonTranslator;
pub use devices::{DeviceSet, IntervalTracker};
pub use hierarchy::HierarchyTranslator;
pub use key::KeyTranslator;
pub use motion::MotionTranslator;
pub use touch::TouchTranslator;

/// Result of a successful translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Records(RecordBatch),
    /// The device hierarchy changed. Broadcast to every translator.
    Devices(HierarchyEvent),
}

/// One entry in the dispatch table.
#[derive(Debug, Clone)]
pub enum Translator {
    Hierarchy(HierarchyTranslator),
    Motion(MotionTranslator),
    Button(ButtonTranslator),
    Key(KeyTranslator),
    Touch(TouchTranslator),
    Barrier(BarrierTranslator),
}

impl Translator {
    /// Default table, in dispatch order.
    pub fn standard() -> Vec<Translator> {
        vec![
            Translator::Hierarchy(HierarchyTranslator::new()),
            Translator::Motion(MotionTranslator::new()),
            Translator::Button(ButtonTranslator::new()),
            Translator::Key(KeyTranslator::new()),
            Translator::Touch(TouchTranslator::new()),
            Translator::Barrier(BarrierTranslator::new()),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Translator::Hierarchy(_) => "hierarchy",
            Translator::Motion(_) => "motion",
            Translator::Button(_) => "button",
            Translator::Key(_) => "key",
            Translator::Touch(_) => "touch",
            Translator::Barrier(_) => "barrier",
        }
    }

    /// Event type codes this translator handles.
    pub fn claimed(&self) -> &'static [u16] {
        match self {
            Translator::Hierarchy(_) => HierarchyTranslator::CLAIMS,
            Translator::Motion(_) => MotionTranslator::CLAIMS,
            Translator::Button(_) => ButtonTranslator::CLAIMS,
            Translator::Key(_) => KeyTranslator::CLAIMS,
            Translator::Touch(_) => TouchTranslator::CLAIMS,
            Translator::Barrier(_) => BarrierTranslator::CLAIMS,
        }
    }

    pub fn claims(&self, event_type: u16) -> bool {
        self.claimed().contains(&event_type)
    }

    pub fn translate(&mut self, event: &RawEvent) -> Result<Translation, TranslationError> {
        match self {
            Translator::Hierarchy(t) => t.translate(event).map(Translation::Devices),
            Translator::Motion(t) => t.translate(event).map(Translation::Records),
            Translator::Button(t) => t.translate(event).map(Translation::Records),
            Translator::Key(t) => t.translate(event).map(Translation::Records),
            Translator::Touch(t) => t.translate(event).map(Translation::Records),
            Translator::Barrier(t) => t.translate(event).map(Translation::Records),
        }
    }

    pub fn apply_device_change(&mut self, change: &HierarchyEvent) {
        match self {
            Translator::Hierarchy(_) => {}
            Translator::Motion(t) => t.apply_device_change(change),
            Translator::Button(t) => t.apply_device_change(change),
            Translator::Key(t) => t.apply_device_change(change),
            Translator::Touch(t) => t.apply_device_change(change),
            Translator::Barrier(t) => t.apply_device_change(change),
        }
    }
}

/// Chain-of-responsibility dispatcher over a translator table.
#[derive(Debug)]
pub struct EventSwitch {
    translators: Vec<Translator>,
    stats: SharedStats,
}

impl EventSwitch {
    pub fn new(stats: SharedStats) -> Self {
        Self::with_translators(Translator::standard(), stats)
    }

    pub fn with_translators(translators: Vec<Translator>, stats: SharedStats) -> Self {
        Self { translators, stats }
    }

    pub fn translators(&self) -> &[Translator] {
        &self.translators
    }

    /// Translate one raw event into zero or more records.
    pub fn dispatch(&mut self, event: &RawEvent) -> RecordBatch {
        let Some(translator) = self
            .translators
            .iter_mut()
            .find(|translator| translator.claims(event.event_type))
        else {
            trace!(event_type = event.event_type, "no translator claims event");
            return RecordBatch::new();
        };

        match translator.translate(event) {
            Ok(Translation::Records(batch)) => batch,
            Ok(Translation::Devices(change)) => {
                for translator in &mut self.translators {
                    translator.apply_device_change(&change);
                }
                RecordBatch::new()
            }
            Err(err) => {
                warn!(
                    translator = translator.name(),
                    error = %err,
                    "dropping untranslatable event"
                );
                self.stats.record_event_dropped();
                RecordBatch::new()
            }
        }
    }
}

pub(crate) fn device_payload(event: &RawEvent) -> Result<&DeviceEvent, TranslationError> {
    match &event.payload {
        Payload::Device(device) => Ok(device),
        other => Err(TranslationError::PayloadMismatch {
            event_type: event.event_type,
            expected: "device",
            found: other.kind(),
        }),
    }
}

/// Shared prefix fields from the event's pointer and focus views.
pub(crate) fn pointer_fields(
    timestamp: DateTime<Utc>,
    device: &DeviceInfo,
    pointer: Option<&PointerState>,
    focus: Option<&FocusWindow>,
    modifiers: u32,
    interval: Option<Duration>,
) -> PointerFields {
    PointerFields {
        interval,
        timestamp,
        position: pointer.map(|pointer| (pointer.root_x, pointer.root_y)),
        device_name: device.name.clone(),
        focus: focus.cloned(),
        screen: pointer.and_then(|pointer| pointer.screen),
        device_type: device.device_type,
        modifiers: Modifier::from_mask(modifiers),
    }
}
