//! Nearest-neighbour routing (method 3)

use rand::RngCore;

use super::{RouteDecision, RouteRequest, RoutedDevice, RoutingStrategy};

/// Routes to the single device closest to the object's position.
///
/// Ties go to the earlier device in join order. A static object keeps its
/// previous device until a loudspeaker update changes the topology.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestStrategy {
    /// Compare directions only (unit vectors) instead of raw positions
    normalize: bool,
}

impl NearestStrategy {
    pub fn new(normalize: bool) -> Self {
        Self { normalize }
    }
}

impl RoutingStrategy for NearestStrategy {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn route(&self, request: &RouteRequest<'_>, _rng: &mut dyn RngCore) -> Option<RouteDecision> {
        if !request.object.dynamic && !request.topology_changed {
            if let Some(previous) = request.retainable_previous() {
                return Some(RouteDecision {
                    devices: previous.to_vec(),
                });
            }
        }

        let mut target = request.object.position.to_cartesian();
        if self.normalize {
            target = target.direction();
        }

        let nearest = request
            .devices
            .iter()
            .map(|device| {
                let position = if self.normalize {
                    device.position.direction()
                } else {
                    device.position
                };
                (device, target.distance_squared(&position))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        log::trace!(
            "nearest: object {:?} -> device {} (d² = {:.4})",
            request.object.id,
            nearest.0.id,
            nearest.1
        );

        Some(RouteDecision::single(RoutedDevice {
            id: nearest.0.id,
            zone: nearest.0.zone,
            zone_level: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::ActiveDevices;
    use crate::object::AudioObject;
    use crate::position::{ObjectPosition, Position3D};
    use crate::state::RoutingState;
    use crate::strategy::test_support::device;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn devices() -> ActiveDevices {
        ActiveDevices::from_devices(vec![
            device(1, None, Position3D::new(-1.0, 1.0, 0.0)),
            device(2, None, Position3D::new(1.0, 1.0, 0.0)),
            device(3, None, Position3D::new(0.0, -4.0, 0.0)),
        ])
    }

    fn object_at(x: f32, y: f32, dynamic: bool) -> AudioObject {
        let mut object = AudioObject::new(1);
        object.position = ObjectPosition::Cartesian { x, y, z: 0.0 };
        object.dynamic = dynamic;
        object
    }

    fn route(
        strategy: NearestStrategy,
        object: &AudioObject,
        previous: &RoutingState,
        topology_changed: bool,
    ) -> Option<Vec<u32>> {
        let devices = devices();
        let request = RouteRequest {
            object,
            devices: &devices,
            previous,
            topology_changed,
            zone_count: 3,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        strategy.route(&request, &mut rng).map(|d| d.ids())
    }

    #[test]
    fn test_closest_device() {
        let strategy = NearestStrategy::default();
        let fresh = RoutingState::NoHistory;
        assert_eq!(route(strategy, &object_at(0.9, 0.8, true), &fresh, false), Some(vec![2]));
        assert_eq!(route(strategy, &object_at(0.0, -3.0, true), &fresh, false), Some(vec![3]));
    }

    #[test]
    fn test_tie_goes_to_join_order() {
        let strategy = NearestStrategy::default();
        let object = object_at(0.0, 1.0, true);
        assert_eq!(route(strategy, &object, &RoutingState::NoHistory, false), Some(vec![1]));
    }

    #[test]
    fn test_normalized_compares_direction() {
        // Raw distance favours device 1; direction points straight back at device 3
        let object = object_at(0.0, -0.5, true);
        let fresh = RoutingState::NoHistory;
        assert_eq!(route(NearestStrategy::new(false), &object, &fresh, false), Some(vec![1]));
        assert_eq!(route(NearestStrategy::new(true), &object, &fresh, false), Some(vec![3]));
    }

    #[test]
    fn test_static_object_sticks_until_topology_change() {
        let strategy = NearestStrategy::default();
        let object = object_at(0.9, 0.8, false);
        let previous = RoutingState::routed(vec![RoutedDevice::new(1)]);

        assert_eq!(route(strategy, &object, &previous, false), Some(vec![1]));
        assert_eq!(route(strategy, &object, &previous, true), Some(vec![2]));
    }

    #[test]
    fn test_empty_view() {
        let object = object_at(0.0, 1.0, true);
        let empty = ActiveDevices::default();
        let request = RouteRequest {
            object: &object,
            devices: &empty,
            previous: &RoutingState::NoHistory,
            topology_changed: false,
            zone_count: 3,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(NearestStrategy::default().route(&request, &mut rng).is_none());
    }
}
