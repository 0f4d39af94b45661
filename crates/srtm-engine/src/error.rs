//! Error types for the SRTM engine.

use crate::TileAddress;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching, caching or reading SRTM tiles.
#[derive(Debug, Error)]
pub enum SrtmError {
    /// I/O error reading or writing a cache file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error (connection failure, timeout, body read).
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Server answered with a status other than 200 or 404.
    #[error("Invalid response from server for tile {tile}: {status} {message}")]
    Network {
        /// Tile being downloaded.
        tile: TileAddress,
        /// HTTP status code.
        status: u16,
        /// Reason phrase or body text returned by the server.
        message: String,
    },

    /// The remote dataset does not contain this tile.
    #[error("Tile {tile} not found at {url}")]
    NotFound {
        /// Tile being downloaded.
        tile: TileAddress,
        /// URL that answered 404.
        url: String,
    },

    /// Credentials are missing or were rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The disk cache root is not configured or cannot be created.
    #[error("Disk cache unusable: {0}")]
    CacheUnusable(String),

    /// The tile has not been downloaded into the cache.
    #[error("Tile {tile} not in cache")]
    CacheMiss {
        /// Requested tile.
        tile: TileAddress,
    },

    /// The cached archive does not hold a valid elevation grid.
    #[error("Tile file {} is corrupt: {reason}", path.display())]
    CorruptTile {
        /// Tile being decoded.
        tile: TileAddress,
        /// Cache file that failed to decode.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A point's 2x2 neighbourhood falls outside the decoded grid.
    #[error("Point not in tile {tile}? lat={lat}, lon={lon}, x={x}, y={y}")]
    TileLookupBounds {
        /// Tile the point was assigned to.
        tile: TileAddress,
        /// Point latitude.
        lat: f64,
        /// Point longitude.
        lon: f64,
        /// Fractional column.
        x: f64,
        /// Fractional row.
        y: f64,
    },

    /// The three-arc-second dataset has no continent entry for this tile.
    #[error("Could not find continent for tile {tile}")]
    UncoveredTile {
        /// Requested tile.
        tile: TileAddress,
    },

    /// A string could not be parsed as a tile name like `N07E117`.
    #[error("Invalid tile name: {0}")]
    InvalidTileName(String),

    /// A run is already in progress on this orchestrator.
    #[error("A run is already in progress")]
    AlreadyRunning,

    /// Configuration could not be interpreted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration parse or write error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SrtmError {
    /// The tile this error refers to, when it is tile scoped.
    pub fn tile(&self) -> Option<TileAddress> {
        match self {
            SrtmError::Network { tile, .. }
            | SrtmError::NotFound { tile, .. }
            | SrtmError::CacheMiss { tile }
            | SrtmError::CorruptTile { tile, .. }
            | SrtmError::TileLookupBounds { tile, .. }
            | SrtmError::UncoveredTile { tile } => Some(*tile),
            _ => None,
        }
    }
}
