//! Routing strategies
//!
//! Each strategy maps one object onto zero or more active devices:
//!
//! | Index | Method            | Hysteresis                               |
//! |-------|-------------------|------------------------------------------|
//! | 0     | Direct            | none                                     |
//! | 1     | Unknown location  | runs as zonal over join-order zones      |
//! | 2     | Zonal             | single-pick moves only to a better zone  |
//! | 3     | Nearest neighbour | re-searches only after a topology change |
//!
//! A strategy returning `None` is a normal outcome: the engine mutes the
//! object (`mdoOnly`) or leaves it on its bed channel.

mod direct;
mod nearest;
mod zonal;

pub use direct::DirectStrategy;
pub use nearest::NearestStrategy;
pub use zonal::ZonalStrategy;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::active::ActiveDevices;
use crate::loudspeaker::{DeviceId, Zone};
use crate::object::AudioObject;
use crate::state::RoutingState;

/// Strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    Direct,
    /// Legacy configs without positional data; rewritten to zonal
    UnknownLocation,
    Zonal,
    Nearest,
}

impl RoutingMethod {
    pub const MAX: RoutingMethod = RoutingMethod::Nearest;

    /// Map a wire index; indices past the last method clamp to it
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            i64::MIN..=-1 => None,
            0 => Some(Self::Direct),
            1 => Some(Self::UnknownLocation),
            2 => Some(Self::Zonal),
            _ => Some(Self::Nearest),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Direct => 0,
            Self::UnknownLocation => 1,
            Self::Zonal => 2,
            Self::Nearest => 3,
        }
    }

    /// Method for one object: its override capped at the configured method,
    /// or the configured method itself
    pub fn resolve(requested: Option<RoutingMethod>, configured: RoutingMethod) -> Self {
        requested.map_or(configured, |method| method.min(configured))
    }
}

/// One routed device within a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutedDevice {
    pub id: DeviceId,
    pub zone: Option<Zone>,
    /// Priority level of the zone it was chosen for (zonal methods only)
    pub zone_level: Option<u32>,
}

impl RoutedDevice {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            zone: None,
            zone_level: None,
        }
    }
}

/// Result of a successful strategy invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub devices: Vec<RoutedDevice>,
}

impl RouteDecision {
    pub fn single(device: RoutedDevice) -> Self {
        Self {
            devices: vec![device],
        }
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }

    /// Best zone level in the decision
    pub fn zone_level(&self) -> Option<u32> {
        self.devices.iter().filter_map(|d| d.zone_level).max()
    }
}

/// Inputs for one strategy invocation
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub object: &'a AudioObject,
    /// Devices still available to this object (locks and quality applied)
    pub devices: &'a ActiveDevices,
    /// The object's routing state from the previous cycle
    pub previous: &'a RoutingState,
    /// A loudspeaker update or switch was applied this cycle
    pub topology_changed: bool,
    /// Number of configured zones
    pub zone_count: u32,
}

impl RouteRequest<'_> {
    /// Previous routing, if every device in it is still available
    pub fn retainable_previous(&self) -> Option<&[RoutedDevice]> {
        let previous = self.previous.routed_devices()?;
        let available = !previous.is_empty()
            && previous.iter().all(|device| self.devices.contains(device.id));
        available.then_some(previous)
    }
}

/// Strategy interface
pub trait RoutingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pick devices for the object, or `None` if nothing suitable is available
    fn route(&self, request: &RouteRequest<'_>, rng: &mut dyn RngCore) -> Option<RouteDecision>;
}

/// The three executable strategies, dispatched by method
pub struct StrategySet {
    direct: DirectStrategy,
    zonal: ZonalStrategy,
    nearest: NearestStrategy,
}

impl StrategySet {
    pub fn new(normalize_positions: bool) -> Self {
        Self {
            direct: DirectStrategy,
            zonal: ZonalStrategy,
            nearest: NearestStrategy::new(normalize_positions),
        }
    }

    /// Strategy executing `method`; unknown-location runs the zonal strategy
    pub fn for_method(&self, method: RoutingMethod) -> &dyn RoutingStrategy {
        match method {
            RoutingMethod::Direct => &self.direct,
            RoutingMethod::UnknownLocation | RoutingMethod::Zonal => &self.zonal,
            RoutingMethod::Nearest => &self.nearest,
        }
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::new(false)
    }
}
