//! Direct channel routing (method 0)

use rand::RngCore;

use super::{RouteDecision, RouteRequest, RoutedDevice, RoutingStrategy};

/// Routes to the devices the object names in `speakerNumber`, keeping only
/// those currently available. Deterministic, no hysteresis.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectStrategy;

impl RoutingStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn route(&self, request: &RouteRequest<'_>, _rng: &mut dyn RngCore) -> Option<RouteDecision> {
        let mut devices: Vec<RoutedDevice> = Vec::new();
        for &id in &request.object.speaker_number {
            if devices.iter().any(|d| d.id == id) {
                continue;
            }
            if let Some(device) = request.devices.get(id) {
                devices.push(RoutedDevice {
                    id,
                    zone: device.zone,
                    zone_level: None,
                });
            }
        }

        log::trace!(
            "direct: requested {:?}, available {:?}",
            request.object.speaker_number,
            devices.iter().map(|d| d.id).collect::<Vec<_>>()
        );

        (!devices.is_empty()).then_some(RouteDecision { devices })
    }
}
