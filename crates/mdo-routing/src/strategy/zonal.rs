//! Zonal routing (methods 1 and 2)
//!
//! The object carries a priority per zone (0 = not wanted). Single-pick
//! walks priority levels from best to worst; within a level the zone order
//! is shuffled, and within a zone the device order is shuffled, which
//! spreads equally eligible objects across equally eligible devices.
//!
//! A static object with a previous routing only moves when a strictly
//! better zone level has a free device. Spread mode routes to every device
//! in any wanted zone and keeps no history.

use rand::RngCore;
use rand::seq::SliceRandom;

use super::{RouteDecision, RouteRequest, RoutedDevice, RoutingStrategy};
use crate::active::ActiveDevice;
use crate::loudspeaker::Zone;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZonalStrategy;

impl ZonalStrategy {
    fn spread(request: &RouteRequest<'_>) -> Option<RouteDecision> {
        let devices: Vec<RoutedDevice> = request
            .devices
            .iter()
            .filter_map(|device| {
                let zone = device.zone.filter(|z| *z <= request.zone_count)?;
                let level = request.object.zone_priority(zone);
                (level > 0).then_some(RoutedDevice {
                    id: device.id,
                    zone: Some(zone),
                    zone_level: Some(level),
                })
            })
            .collect();

        (!devices.is_empty()).then_some(RouteDecision { devices })
    }

    fn single_pick(request: &RouteRequest<'_>, rng: &mut dyn RngCore) -> Option<RouteDecision> {
        let object = request.object;
        let retained = if object.dynamic {
            None
        } else {
            request.retainable_previous()
        };

        // Static objects only search strictly better levels than they hold
        let min_level = match retained {
            Some(previous) => {
                previous.iter().filter_map(|d| d.zone_level).max().unwrap_or(0) + 1
            }
            None => 1,
        };

        // Zones past the priority list have priority 0
        let last_zone = request.zone_count.min(object.zone_priorities.len() as u32);
        let mut levels: Vec<u32> = (1..=last_zone)
            .map(|zone| object.zone_priority(zone))
            .filter(|level| *level >= min_level)
            .collect();
        levels.sort_unstable_by(|a, b| b.cmp(a));
        levels.dedup();

        for level in levels {
            let mut zones: Vec<Zone> = (1..=last_zone)
                .filter(|zone| object.zone_priority(*zone) == level)
                .collect();
            zones.shuffle(rng);

            for zone in zones {
                let mut candidates: Vec<&ActiveDevice> = request.devices.iter().collect();
                candidates.shuffle(rng);

                if let Some(device) = candidates.into_iter().find(|d| d.zone == Some(zone)) {
                    log::trace!(
                        "zonal: object {:?} -> device {} (zone {}, level {})",
                        object.id,
                        device.id,
                        zone,
                        level
                    );
                    return Some(RouteDecision::single(RoutedDevice {
                        id: device.id,
                        zone: Some(zone),
                        zone_level: Some(level),
                    }));
                }
            }
        }

        retained.map(|previous| RouteDecision {
            devices: previous.to_vec(),
        })
    }
}

impl RoutingStrategy for ZonalStrategy {
    fn name(&self) -> &'static str {
        "zonal"
    }

    fn route(&self, request: &RouteRequest<'_>, rng: &mut dyn RngCore) -> Option<RouteDecision> {
        if request.object.zone_priorities.is_empty() {
            return None;
        }
        if request.object.spread {
            Self::spread(request)
        } else {
            Self::single_pick(request, rng)
        }
    }
}
