//! Object and loudspeaker coordinates
//!
//! Axes: +x right, +y front, +z up. Polar angles are in degrees with
//! azimuth 0 straight ahead and positive to the right.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_polar(az: f32, el: f32, dist: f32) -> Self {
        let (sin_az, cos_az) = az.to_radians().sin_cos();
        let (sin_el, cos_el) = el.to_radians().sin_cos();
        Self::new(dist * sin_az * cos_el, dist * cos_az * cos_el, dist * sin_el)
    }

    /// Unit vector towards this point; a point at the listener faces front
    pub fn direction(&self) -> Self {
        let length = self.distance_squared(&Self::default()).sqrt();
        if length < 1e-10 {
            Self::new(0.0, 1.0, 0.0)
        } else {
            Self::new(self.x / length, self.y / length, self.z / length)
        }
    }

    /// Squared Euclidean distance; ordering-equivalent to the true distance
    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Object position as delivered by the metadata pipeline, type-tagged by
/// coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectPosition {
    /// Azimuth/elevation in degrees, distance unit-less
    Polar { az: f32, el: f32, dist: f32 },
    /// Cartesian, same axes as [`Position3D`]
    Cartesian { x: f32, y: f32, z: f32 },
}

impl ObjectPosition {
    pub fn to_cartesian(&self) -> Position3D {
        match *self {
            Self::Polar { az, el, dist } => Position3D::from_polar(az, el, dist),
            Self::Cartesian { x, y, z } => Position3D::new(x, y, z),
        }
    }
}

impl Default for ObjectPosition {
    fn default() -> Self {
        Self::Polar {
            az: 0.0,
            el: 0.0,
            dist: 1.0,
        }
    }
}
