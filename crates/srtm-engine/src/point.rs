//! The minimal view of a track point the engine works with.

use crate::TileAddress;
use serde::{Deserialize, Serialize};

/// Unit an altitude is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    /// Meters. SRTM data is always in meters.
    #[default]
    Meters,
    /// International feet.
    Feet,
}

/// An altitude value with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Altitude {
    /// Numeric value.
    pub value: f64,
    /// Unit of `value`.
    #[serde(default)]
    pub unit: AltitudeUnit,
}

impl Altitude {
    /// An altitude in meters.
    pub fn meters(value: f64) -> Self {
        Self {
            value,
            unit: AltitudeUnit::Meters,
        }
    }

    /// True for a zero altitude, in any unit.
    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

/// A geographic point, optionally with an altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in decimal degrees.
    #[serde(alias = "latitude")]
    pub lat: f64,
    /// Longitude in decimal degrees.
    #[serde(alias = "longitude")]
    pub lon: f64,
    /// Altitude, if known.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "altitude")]
    pub elevation: Option<Altitude>,
}

impl Point {
    /// A point without altitude.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
        }
    }

    /// Set the altitude.
    pub fn with_elevation(mut self, elevation: Altitude) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// The tile this point falls in.
    pub fn tile(&self) -> TileAddress {
        TileAddress::containing(self.lat, self.lon)
    }
}
