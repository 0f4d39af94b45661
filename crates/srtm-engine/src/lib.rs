//! # srtm-engine
//!
//! Elevation lookup for geographic points from NASA SRTM terrain tiles.
//!
//! Given points that lack an elevation, the engine works out which 1x1 degree
//! tiles cover them, makes sure each tile is in a local disk cache
//! (downloading it if needed), decodes the tile's grid of big-endian 16-bit
//! samples and interpolates an elevation in meters for every point.
//!
//! ## Datasets
//!
//! - SRTM3 v2.1: 3 arc-second grids (1201x1201), anonymous download. The
//!   download URL depends on the continent the tile belongs to, taken from a
//!   [`ContinentTable`].
//! - SRTMGL1 v003: 1 arc-second grids (3601x3601). Downloads go through the
//!   NASA Earthdata sign-on and need [`Credentials`].
//!
//! Tiles are named after their south-west corner, e.g. `N07E117` covers
//! latitude 7°N to 8°N and longitude 117°E to 118°E.
//!
//! ## Cache layout
//!
//! ```text
//! <cache root>/srtm/SRTM3_v21/N07E117.hgt.zip
//! <cache root>/srtm/SRTMGL1_v003/N07E117.SRTMGL1.hgt.zip
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use srtm_engine::{CancelToken, LookupOrchestrator, Point, SrtmConfig, TrackKind};
//! use std::sync::Arc;
//!
//! let config = SrtmConfig::load("srtm.yaml")?;
//! let cache = Arc::new(config.disk_cache());
//! let lookup = LookupOrchestrator::new(cache.clone(), config.sources(cache)?);
//!
//! let mut points = vec![Point::new(7.25, 117.5), Point::new(7.5, 117.25)];
//! let report = lookup.run(&mut points, TrackKind::Primary, || false, &CancelToken::new(), &|_| {})?;
//! println!("{}", report.outcome());
//! # Ok::<(), srtm_engine::SrtmError>(())
//! ```

mod bulk;
mod cache;
mod config;
mod credentials;
mod error;
mod grid;
mod interpolate;
mod lookup;
mod point;
pub mod source;
mod task;
pub mod telemetry;
mod tile;

pub use bulk::{BoundingBox, BulkDownloadOrchestrator, BulkReport};
pub use cache::{DiskCache, SRTM_DIR_NAME};
pub use config::{
    Endpoints, SrtmConfig, DEFAULT_AUTH_HOST, DEFAULT_ONE_ARC_URL, DEFAULT_THREE_ARC_URL,
    DEFAULT_TIMEOUT_SECS,
};
pub use credentials::Credentials;
pub use error::SrtmError;
pub use grid::{ElevationGrid, ONE_ARC_SECOND_ROW_SIZE, THREE_ARC_SECOND_ROW_SIZE, VOID_VALUE};
pub use interpolate::{interpolate, Neighbourhood, TrackKind};
pub use lookup::{
    compile_tiles, needs_elevation, neighbourhood, ElevationUpdate, LookupOrchestrator,
    LookupOutcome, LookupReport, ZeroPolicy,
};
pub use point::{Altitude, AltitudeUnit, Point};
pub use source::{
    ContinentTable, ElevationSource, HttpSettings, OneArcSecondSource, SourceKind,
    ThreeArcSecondSource,
};
pub use task::{CancelToken, ProgressEvent, RunHandle, RunState};
pub use telemetry::describe_metrics;
pub use tile::TileAddress;

/// Result type for SRTM operations.
pub type Result<T> = std::result::Result<T, SrtmError>;
