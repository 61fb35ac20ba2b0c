//! Active device view
//!
//! The per-cycle list of MDO devices an object may be routed to: enabled,
//! MDO-capable loudspeakers ordered by join time. The engine narrows it
//! per object (exclusive locks, minimum quality) before handing it to a
//! strategy.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::loudspeaker::{DeviceId, LoudspeakerRegistry, Quality, Zone};
use crate::position::Position3D;

/// Routing-relevant snapshot of one usable device
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDevice {
    pub id: DeviceId,
    pub zone: Option<Zone>,
    pub quality: Quality,
    pub position: Position3D,
    pub join_order: Option<i64>,
    /// Linear per-device trim
    pub gain: f32,
}

/// Ordered list of usable MDO devices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveDevices {
    devices: Vec<ActiveDevice>,
}

/// Known join orders ascend; unknown ones go last
fn join_order_cmp(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl ActiveDevices {
    /// Derive the view from the registry.
    ///
    /// Ties keep registry order (the sort is stable). An empty view is a
    /// normal degraded state, not an error.
    pub fn compute(registry: &LoudspeakerRegistry) -> Self {
        let mut devices: Vec<ActiveDevice> = registry
            .iter()
            .filter(|s| s.mdo && s.enabled)
            .map(|s| ActiveDevice {
                id: s.id,
                zone: s.zone,
                quality: s.quality,
                position: s.position,
                join_order: s.join_order,
                gain: s.gain_linear(),
            })
            .collect();

        devices.sort_by(|a, b| join_order_cmp(a.join_order, b.join_order));
        Self { devices }
    }

    pub fn from_devices(devices: Vec<ActiveDevice>) -> Self {
        Self { devices }
    }

    /// Replace device zones with their join rank, capped at `max_zones`.
    ///
    /// Used for configurations without positional data: the first device
    /// to join lands in zone 1, the second in zone 2, and everything past
    /// `max_zones` shares the last zone.
    pub fn with_join_order_zones(&self, max_zones: u32) -> Self {
        let cap = max_zones.max(1);
        let devices = self
            .devices
            .iter()
            .enumerate()
            .map(|(index, device)| ActiveDevice {
                zone: Some((index as u32 + 1).min(cap)),
                ..device.clone()
            })
            .collect();
        Self { devices }
    }

    /// Drop devices already claimed by an exclusive object
    pub fn without(&self, locked: &BTreeSet<DeviceId>) -> Self {
        if locked.is_empty() {
            return self.clone();
        }
        self.filtered(|d| !locked.contains(&d.id))
    }

    /// Keep devices at or above `min_quality`
    pub fn with_min_quality(&self, min_quality: Option<Quality>) -> Self {
        match min_quality {
            Some(min) => self.filtered(|d| d.quality >= min),
            None => self.clone(),
        }
    }

    fn filtered(&self, keep: impl Fn(&ActiveDevice) -> bool) -> Self {
        Self {
            devices: self.devices.iter().filter(|d| keep(d)).cloned().collect(),
        }
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }

    pub fn get(&self, id: DeviceId) -> Option<&ActiveDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.get(id).is_some()
    }

    pub fn zone_of(&self, id: DeviceId) -> Option<Zone> {
        self.get(id).and_then(|d| d.zone)
    }

    pub fn quality_of(&self, id: DeviceId) -> Option<Quality> {
        self.get(id).map(|d| d.quality)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActiveDevice> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
