//! Pre-populating the cache for an area.

use crate::lookup::join_errors;
use crate::source::ElevationSource;
use crate::task::{spawn_run, CancelToken, ProgressEvent, RunGuard, RunHandle, RunState, StateCell};
use crate::telemetry::{CACHE_HITS, TILE_FAILURES};
use crate::{Point, Result, SrtmError, TileAddress};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

const LAT_RANGE: RangeInclusive<f64> = -90.0..=90.0;
const LON_RANGE: RangeInclusive<f64> = -180.0..=180.0;
/// Latitude of the northernmost tile.
const MAX_TILE_LAT: i32 = 89;
/// Longitude of the easternmost tile.
const MAX_TILE_LON: i32 = 179;

/// A latitude/longitude rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge, in [-90, 90].
    pub min_lat: f64,
    /// Northern edge, in [-90, 90].
    pub max_lat: f64,
    /// Western edge, in [-180, 180].
    pub min_lon: f64,
    /// Eastern edge, in [-180, 180].
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a box, rejecting inverted bounds and bounds outside the globe.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let on_globe = LAT_RANGE.contains(&min_lat)
            && LAT_RANGE.contains(&max_lat)
            && LON_RANGE.contains(&min_lon)
            && LON_RANGE.contains(&max_lon);
        if !on_globe || min_lat > max_lat || min_lon > max_lon {
            return Err(SrtmError::Config(format!(
                "invalid bounding box lat [{}, {}] lon [{}, {}]",
                min_lat, max_lat, min_lon, max_lon
            )));
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Smallest box holding every point, `Ok(None)` for an empty slice.
    ///
    /// Fails like [`new`](Self::new) if a point lies off the globe.
    pub fn from_points(points: &[Point]) -> Result<Option<Self>> {
        let Some(first) = points.first() else {
            return Ok(None);
        };
        let (mut min_lat, mut max_lat) = (first.lat, first.lat);
        let (mut min_lon, mut max_lon) = (first.lon, first.lon);
        for p in &points[1..] {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lon = min_lon.min(p.lon);
            max_lon = max_lon.max(p.lon);
        }
        Self::new(min_lat, max_lat, min_lon, max_lon).map(Some)
    }

    /// Every tile whose square intersects the box, longitude-major.
    ///
    /// A box touching the north pole or the antimeridian stops at the last
    /// tile row or column.
    pub fn covering_tiles(&self) -> Vec<TileAddress> {
        let max_lat = (self.max_lat.floor() as i32).min(MAX_TILE_LAT);
        let max_lon = (self.max_lon.floor() as i32).min(MAX_TILE_LON);
        let lat_range = self.min_lat.floor() as i32..=max_lat;
        let lon_range = self.min_lon.floor() as i32..=max_lon;
        lon_range
            .flat_map(|lon| lat_range.clone().map(move |lat| TileAddress::new(lat, lon)))
            .collect()
    }
}

/// Everything a bulk download did.
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Tiles covering the box, in processing order.
    pub tiles: Vec<TileAddress>,
    /// Tiles already in the cache.
    pub skipped: usize,
    /// Tiles downloaded by this run.
    pub downloaded: usize,
    /// Tiles that could not be downloaded.
    pub failures: Vec<SrtmError>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
}

impl BulkReport {
    /// Number of tiles that failed.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// All failure messages, one per line, or `None` if there were none.
    pub fn error_message(&self) -> Option<String> {
        join_errors(&self.failures)
    }
}

impl fmt::Display for BulkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.tiles.len();
        write!(
            f,
            "{} {}: {} already cached, {} downloaded, {} failed",
            total,
            if total == 1 { "tile" } else { "tiles" },
            self.skipped,
            self.downloaded,
            self.failed()
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// Downloads every tile covering a bounding box into one source's cache.
#[derive(Debug, Clone)]
pub struct BulkDownloadOrchestrator {
    source: Arc<dyn ElevationSource>,
    state: StateCell,
}

impl BulkDownloadOrchestrator {
    /// Create an orchestrator filling the cache of `source`.
    pub fn new(source: Arc<dyn ElevationSource>) -> Self {
        Self {
            source,
            state: StateCell::default(),
        }
    }

    /// State of the current or last run.
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Download on the calling thread.
    pub fn run(
        &self,
        bbox: &BoundingBox,
        cancel: &CancelToken,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<BulkReport> {
        let guard = self.state.try_start(RunState::CompilingTiles)?;
        self.execute(guard, bbox, cancel, progress)
    }

    /// Download on a worker thread.
    pub fn begin(&self, bbox: BoundingBox) -> Result<RunHandle<Result<BulkReport>>> {
        let guard = self.state.try_start(RunState::CompilingTiles)?;
        let this = self.clone();
        spawn_run("srtm-bulk-download", move |cancel, progress| {
            this.execute(guard, &bbox, cancel, progress)
        })
    }

    fn execute(
        &self,
        guard: RunGuard,
        bbox: &BoundingBox,
        cancel: &CancelToken,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<BulkReport> {
        self.source.cache().require_usable()?;
        if !self.source.is_ready_to_use() {
            return Err(SrtmError::Auth(format!(
                "{} is not ready to use: no credentials configured",
                self.source.name()
            )));
        }

        let mut report = BulkReport {
            tiles: bbox.covering_tiles(),
            ..Default::default()
        };
        let total = report.tiles.len();
        tracing::info!("Bulk download of {} {} tiles", total, self.source.name());

        guard.set(RunState::FetchingAndApplying);
        progress(ProgressEvent::Started { total });

        for index in 0..total {
            if cancel.is_cancelled() {
                break;
            }
            let tile = report.tiles[index];
            if self.source.is_cached(&tile) {
                tracing::debug!("{} already cached", tile);
                metrics::counter!(CACHE_HITS).increment(1);
                report.skipped += 1;
            } else {
                match self.source.download_tile(&tile) {
                    Ok(()) => report.downloaded += 1,
                    Err(e) => {
                        tracing::warn!("Tile {} not downloaded: {}", tile, e);
                        metrics::counter!(TILE_FAILURES).increment(1);
                        report.failures.push(e);
                    }
                }
            }
            progress(ProgressEvent::TileDone {
                index: index + 1,
                total,
                tile,
            });
        }

        report.cancelled = cancel.is_cancelled();
        tracing::info!("Bulk download finished: {}", report);
        guard.set(if report.cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        });
        Ok(report)
    }
}
