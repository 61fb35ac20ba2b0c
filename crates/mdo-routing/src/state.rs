//! Per-object routing memory
//!
//! [`RoutingTable`] survives across cycles and gives strategies their
//! hysteresis. [`GroupCache`] lives for one cycle and lets grouped objects
//! share the decision computed for the first member.

use std::collections::HashMap;

use crate::loudspeaker::DeviceId;
use crate::object::{AudioObject, ObjectId};
use crate::strategy::{RouteDecision, RoutedDevice};

/// Routing state of one object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoutingState {
    /// No previous MDO routing (bed channel or never seen)
    #[default]
    NoHistory,
    /// Routed to these devices last cycle
    Routed { devices: Vec<RoutedDevice> },
    /// Inactive: level forced to zero
    Muted,
}

impl RoutingState {
    pub fn routed(devices: Vec<RoutedDevice>) -> Self {
        Self::Routed { devices }
    }

    pub fn from_decision(decision: &RouteDecision) -> Self {
        Self::Routed {
            devices: decision.devices.clone(),
        }
    }

    pub fn routed_devices(&self) -> Option<&[RoutedDevice]> {
        match self {
            Self::Routed { devices } => Some(devices),
            _ => None,
        }
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.routed_devices()
            .map(|devices| devices.iter().map(|d| d.id).collect())
            .unwrap_or_default()
    }

    /// Best zone level of the previous routing
    pub fn zone_level(&self) -> Option<u32> {
        self.routed_devices()?
            .iter()
            .filter_map(|d| d.zone_level)
            .max()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Muted)
    }
}

/// Routing state keyed by object id, persisted across cycles
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: HashMap<ObjectId, RoutingState>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for an object; unknown ids have no history
    pub fn get(&self, id: ObjectId) -> &RoutingState {
        const EMPTY: &RoutingState = &RoutingState::NoHistory;
        self.entries.get(&id).unwrap_or(EMPTY)
    }

    pub fn set(&mut self, id: ObjectId, state: RoutingState) {
        self.entries.insert(id, state);
    }

    /// Active flags of every known object
    pub fn active_flags(&self) -> HashMap<ObjectId, bool> {
        self.entries
            .iter()
            .map(|(id, state)| (*id, state.is_active()))
            .collect()
    }

    /// Drop the state of every object `keep` rejects
    pub fn retain(&mut self, mut keep: impl FnMut(ObjectId) -> bool) {
        self.entries.retain(|id, _| keep(*id));
    }

    /// Forget every previous routing
    pub fn clear_history(&mut self) {
        for state in self.entries.values_mut() {
            *state = RoutingState::NoHistory;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A group leader's finished result
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub object: AudioObject,
    pub state: RoutingState,
}

/// Per-cycle cache of group results, keyed by group id (> 0)
#[derive(Debug, Default)]
pub struct GroupCache {
    results: HashMap<u32, CachedResult>,
}

impl GroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first result for a group; later inserts are ignored
    pub fn insert(&mut self, group: u32, object: &AudioObject, state: &RoutingState) {
        if group == 0 {
            return;
        }
        self.results.entry(group).or_insert_with(|| CachedResult {
            object: object.clone(),
            state: state.clone(),
        });
    }

    pub fn get(&self, group: u32) -> Option<&CachedResult> {
        if group == 0 {
            return None;
        }
        self.results.get(&group)
    }

    /// Overwrite `object` with the cached group result, keeping its own
    /// id and label. Returns the copied state, or `None` on a cache miss.
    pub fn apply(&self, object: &mut AudioObject) -> Option<RoutingState> {
        let cached = self.get(object.group)?;
        let id = object.id;
        let label = std::mem::take(&mut object.label);
        *object = cached.object.clone();
        object.id = id;
        object.label = label;
        Some(cached.state.clone())
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
