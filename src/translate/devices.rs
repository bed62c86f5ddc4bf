//! Per-translator device state.

use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::event::{DeviceInfo, HierarchyEvent};

/// Devices a translator is responsible for, kept current by hierarchy changes.
#[derive(Debug, Clone)]
pub struct DeviceSet {
    devices: HashMap<i32, DeviceInfo>,
    accepts: fn(&DeviceInfo) -> bool,
}

impl DeviceSet {
    /// Create an empty set that only admits devices passing `accepts`.
    pub fn new(accepts: fn(&DeviceInfo) -> bool) -> Self {
        Self {
            devices: HashMap::new(),
            accepts,
        }
    }

    /// Apply removals, then additions. An added device replaces any entry
    /// with the same id, and is dropped if it no longer qualifies.
    pub fn apply(&mut self, change: &HierarchyEvent) {
        for id in &change.removed {
            if self.devices.remove(id).is_some() {
                debug!(device = id, "device removed");
            }
        }
        for info in &change.added {
            if (self.accepts)(info) {
                debug!(device = info.id, name = ?info.name, "device added");
                self.devices.insert(info.id, info.clone());
            } else {
                self.devices.remove(&info.id);
            }
        }
    }

    pub fn get(&self, id: i32) -> Option<&DeviceInfo> {
        self.devices.get(&id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Time between consecutive accepted events, per device.
#[derive(Debug, Clone, Default)]
pub struct IntervalTracker {
    previous: HashMap<i32, u64>,
}

impl IntervalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `time` (device clock, microseconds) for `device` and return the
    /// interval since the previous event. The first event of a device, and an
    /// event whose clock went backwards, have no interval.
    pub fn interval(&mut self, device: i32, time: u64) -> Option<Duration> {
        match self.previous.insert(device, time) {
            Some(previous) if time >= previous => Some(Duration::from_micros(time - previous)),
            _ => None,
        }
    }

    pub fn forget(&mut self, device: i32) {
        self.previous.remove(&device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DeviceType;

    #[test]
    fn test_interval_tracking() {
        let mut tracker = IntervalTracker::new();

        assert_eq!(tracker.interval(1, 100), None);
        assert_eq!(tracker.interval(1, 350), Some(Duration::from_micros(250)));
        assert_eq!(tracker.interval(2, 400), None);
        // Clock went backwards: reset.
        assert_eq!(tracker.interval(1, 50), None);
        assert_eq!(tracker.interval(1, 60), Some(Duration::from_micros(10)));

        tracker.forget(1);
        assert_eq!(tracker.interval(1, 70), None);
    }

    #[test]
    fn test_device_set_follows_hierarchy() {
        let mut set = DeviceSet::new(|info| info.has_keys);
        let keyboard = DeviceInfo {
            has_keys: true,
            ..DeviceInfo::new(3, DeviceType::Keyboard)
        };
        let mouse = DeviceInfo::new(4, DeviceType::Mouse);

        set.apply(&HierarchyEvent {
            added: vec![keyboard.clone(), mouse],
            removed: vec![],
        });
        assert!(set.contains(3));
        assert!(!set.contains(4));

        // The keyboard lost its keys.
        set.apply(&HierarchyEvent {
            added: vec![DeviceInfo::new(3, DeviceType::Keyboard)],
            removed: vec![],
        });
        assert!(set.is_empty());

        set.apply(&HierarchyEvent {
            added: vec![keyboard],
            removed: vec![],
        });
        set.apply(&HierarchyEvent {
            added: vec![],
            removed: vec![3],
        });
        assert_eq!(set.len(), 0);
    }
}
