//! Elevation data sources.
//!
//! Each source knows how to download a tile into its own directory of the
//! [`DiskCache`] and how big its grids are. Decoding a cached tile is shared
//! by all sources through the provided methods of [`ElevationSource`].

mod http;
mod one_arc;
mod three_arc;

pub use http::HttpSettings;
pub use one_arc::{OneArcSecondSource, AUTH_TEST_TILE, MAX_REDIRECTS};
pub use three_arc::{ContinentTable, ThreeArcSecondSource, CONTINENTS};

use crate::{DiskCache, ElevationGrid, Result, TileAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The closed set of supported datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// SRTM3 v2.1, three arc seconds, anonymous download.
    #[serde(rename = "srtm3")]
    ThreeArcSecond,
    /// SRTMGL1 v003, one arc second, requires an Earthdata login.
    #[serde(rename = "srtm-gl1")]
    OneArcSecond,
}

impl SourceKind {
    /// Short identifier used in configuration and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::ThreeArcSecond => "srtm3",
            SourceKind::OneArcSecond => "srtm-gl1",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srtm3" => Ok(SourceKind::ThreeArcSecond),
            "srtm-gl1" | "srtmgl1" => Ok(SourceKind::OneArcSecond),
            other => Err(format!("unknown source '{}' (expected srtm3 or srtm-gl1)", other)),
        }
    }
}

/// A dataset that tiles can be downloaded from and read back out of the cache.
pub trait ElevationSource: Send + Sync + fmt::Debug {
    /// Dataset name, also the name of its cache subdirectory.
    fn name(&self) -> &str;

    /// Whether the source can download right now (e.g. credentials present).
    fn is_ready_to_use(&self) -> bool;

    /// Number of samples per grid edge for a tile.
    fn row_size(&self, tile: &TileAddress) -> usize;

    /// Suffix appended to the tile name for cache files.
    fn extension(&self) -> &str;

    /// The cache this source stores tiles in.
    fn cache(&self) -> &DiskCache;

    /// Download a tile into the cache.
    ///
    /// The cache file only appears once the whole body has been written.
    fn download_tile(&self, tile: &TileAddress) -> Result<()>;

    /// Path of the cache file for a tile.
    fn cache_file(&self, tile: &TileAddress) -> Result<PathBuf> {
        let dir = self.cache().directory_for(self.name())?;
        Ok(dir.join(format!("{}{}", tile.name(), self.extension())))
    }

    /// Whether the tile is already in the cache.
    fn is_cached(&self, tile: &TileAddress) -> bool {
        self.cache_file(tile).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Decode the cached grid of a tile.
    fn tile_heights(&self, tile: &TileAddress) -> Result<ElevationGrid> {
        let path = self.cache_file(tile)?;
        ElevationGrid::from_archive(*tile, &path, self.row_size(tile))
    }
}
