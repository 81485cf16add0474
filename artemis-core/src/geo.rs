//! Planar coordinates used by spawn locations and GPS samples.

use serde::{Deserialize, Serialize};

/// A point on a planet map, in the game's own units (roughly metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Build a coordinate only when both axes are known.
    pub fn from_parts(lon: Option<f64>, lat: Option<f64>) -> Option<Self> {
        match (lon, lat) {
            (Some(lon), Some(lat)) => Some(Self { lon, lat }),
            _ => None,
        }
    }

    /// Straight-line distance on the planet map. Planets are treated as flat.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let dlon = self.lon - other.lon;
        let dlat = self.lat - other.lat;
        (dlon * dlon + dlat * dlat).sqrt()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lon, self.lat)
    }
}
