//! Tile addressing for 1x1 degree SRTM cells.

use crate::{Result, SrtmError};
use std::fmt;
use std::str::FromStr;

/// A 1°×1° terrain tile, identified by the integer latitude and longitude
/// of its south-west corner.
///
/// Longitudes are not normalised: `(0, 180)` and `(0, -180)` are distinct
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    latitude: i32,
    longitude: i32,
}

impl TileAddress {
    /// Create a tile address from its south-west corner.
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The tile containing a geographic point.
    ///
    /// Coordinates are floored, so `(-0.5, -0.5)` lands in `S01W001`.
    pub fn containing(lat: f64, lon: f64) -> Self {
        Self {
            latitude: lat.floor() as i32,
            longitude: lon.floor() as i32,
        }
    }

    /// Latitude of the south-west corner.
    pub fn latitude(&self) -> i32 {
        self.latitude
    }

    /// Longitude of the south-west corner.
    pub fn longitude(&self) -> i32 {
        self.longitude
    }

    /// Canonical tile name such as `N07E117` or `S12W077`.
    pub fn name(&self) -> String {
        format!(
            "{}{:02}{}{:03}",
            if self.latitude >= 0 { 'N' } else { 'S' },
            self.latitude.unsigned_abs(),
            if self.longitude >= 0 { 'E' } else { 'W' },
            self.longitude.unsigned_abs()
        )
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for TileAddress {
    type Err = SrtmError;

    /// Parse a tile name such as `N07E117`. Any trailing file extension
    /// (`N07E117.hgt.zip`) is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SrtmError::InvalidTileName(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() < 7 {
            return Err(invalid());
        }

        let lat_sign = match bytes[0].to_ascii_uppercase() {
            b'N' => 1,
            b'S' => -1,
            _ => return Err(invalid()),
        };
        let lon_sign = match bytes[3].to_ascii_uppercase() {
            b'E' => 1,
            b'W' => -1,
            _ => return Err(invalid()),
        };

        let lat: i32 = s
            .get(1..3)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| d.parse().ok())
            .ok_or_else(invalid)?;
        let lon: i32 = s
            .get(4..7)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| d.parse().ok())
            .ok_or_else(invalid)?;

        Ok(Self::new(lat_sign * lat, lon_sign * lon))
    }
}
