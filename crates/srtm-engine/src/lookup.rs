//! Point elevation lookup.
//!
//! A lookup scans the points once to decide whether zero altitudes should be
//! replaced, compiles the list of tiles covering the points that need an
//! elevation, then walks that list in order: each tile is taken from the
//! cache when any source has it, downloaded otherwise, decoded, and used to
//! interpolate every matching point. A failing tile is recorded and the run
//! moves on to the next one.

use crate::interpolate::{interpolate, Neighbourhood, TrackKind};
use crate::source::ElevationSource;
use crate::task::{spawn_run, CancelToken, ProgressEvent, RunGuard, RunHandle, RunState, StateCell};
use crate::telemetry::{CACHE_HITS, POINTS_UPDATED, TILE_FAILURES};
use crate::{Altitude, DiskCache, ElevationGrid, Point, Result, SrtmError, TileAddress};
use std::fmt;
use std::sync::Arc;

/// How zero altitudes are treated, derived from the whole point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroPolicy {
    /// Every point with an altitude has zero: treat zeros as missing.
    Overwrite,
    /// No zero altitudes (or no altitudes at all): nothing to decide.
    Keep,
    /// Zero and non-zero altitudes are mixed: the caller must decide.
    AskCaller,
}

impl ZeroPolicy {
    /// Classify a point set.
    pub fn classify(points: &[Point]) -> Self {
        let mut has_zero = false;
        let mut has_non_zero = false;
        for elevation in points.iter().filter_map(|p| p.elevation.as_ref()) {
            if elevation.is_zero() {
                has_zero = true;
            } else {
                has_non_zero = true;
            }
        }
        match (has_zero, has_non_zero) {
            (true, false) => ZeroPolicy::Overwrite,
            (true, true) => ZeroPolicy::AskCaller,
            _ => ZeroPolicy::Keep,
        }
    }

    /// Turn the policy into a decision, asking only in the ambiguous case.
    pub fn resolve(self, ask: impl FnOnce() -> bool) -> bool {
        match self {
            ZeroPolicy::Overwrite => true,
            ZeroPolicy::Keep => false,
            ZeroPolicy::AskCaller => ask(),
        }
    }
}

/// Whether a point should receive an elevation.
pub fn needs_elevation(point: &Point, overwrite_zeros: bool) -> bool {
    match &point.elevation {
        None => true,
        Some(elevation) => overwrite_zeros && elevation.is_zero(),
    }
}

/// The de-duplicated tiles covering every point that needs an elevation,
/// in order of first appearance.
pub fn compile_tiles(points: &[Point], overwrite_zeros: bool) -> Vec<TileAddress> {
    let mut tiles: Vec<TileAddress> = Vec::new();
    for point in points.iter().filter(|p| needs_elevation(p, overwrite_zeros)) {
        let tile = point.tile();
        if !tiles.contains(&tile) {
            tiles.push(tile);
        }
    }
    tiles
}

/// Locate a point in a decoded grid.
///
/// Returns the `[bottom_left, bottom_right, top_left, top_right]` samples
/// and the fractional offsets towards the right column and the top row.
pub fn neighbourhood(
    grid: &ElevationGrid,
    tile: TileAddress,
    lat: f64,
    lon: f64,
) -> Result<(Neighbourhood, f64, f64)> {
    let row_size = grid.row_size();
    let span = (row_size - 1) as f64;
    let x = (lon - f64::from(tile.longitude())) * span;
    let y = row_size as f64 - (lat - f64::from(tile.latitude())) * span;
    let out_of_bounds = || SrtmError::TileLookupBounds {
        tile,
        lat,
        lon,
        x,
        y,
    };

    // `y` counts rows from the top, offset by one so that floor(y) is the
    // row just south of the point. On the southern edge itself that would
    // be one past the last row, so use the last row with full weight.
    let (row, fy) = if y == row_size as f64 {
        (row_size - 1, 1.0)
    } else {
        let row = y.floor();
        if !(1.0..=span).contains(&row) {
            return Err(out_of_bounds());
        }
        (row as usize, y - row)
    };
    let col = x.floor();
    if !(0.0..span).contains(&col) {
        return Err(out_of_bounds());
    }
    let col = col as usize;
    let alpha = x - col as f64;
    let beta = 1.0 - fy;

    let idx = row * row_size + col;
    let sample = |i: usize| grid.sample(i).ok_or_else(out_of_bounds);
    let samples = [
        sample(idx)?,
        sample(idx + 1)?,
        sample(idx - row_size)?,
        sample(idx - row_size + 1)?,
    ];
    Ok((samples, alpha, beta))
}

/// One elevation written by a lookup, enough to undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationUpdate {
    /// Index of the point in the input slice.
    pub index: usize,
    /// Altitude before the lookup.
    pub previous: Option<Altitude>,
    /// Altitude written by the lookup, always in meters.
    pub elevation: Altitude,
}

/// Everything a lookup run did.
#[derive(Debug, Default)]
pub struct LookupReport {
    /// Tiles compiled for the run, in processing order.
    pub tiles: Vec<TileAddress>,
    /// Tiles processed before the run ended.
    pub tiles_processed: usize,
    /// Whether zero altitudes were treated as missing.
    pub overwrite_zeros: bool,
    /// Elevations applied, in application order.
    pub updates: Vec<ElevationUpdate>,
    /// Per-tile and per-point failures.
    pub failures: Vec<SrtmError>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
}

/// The single message a lookup run reports to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The run was cancelled; nothing is reported.
    Cancelled,
    /// Some tiles or points failed. Carries the combined error text.
    Failed(String),
    /// This many points received an elevation.
    Found(usize),
    /// Tiles were processed but no point received an elevation.
    NoneFound,
    /// Every point already had an elevation.
    NothingRequired,
}

impl fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupOutcome::Cancelled => f.write_str("Lookup cancelled"),
            LookupOutcome::Failed(message) => f.write_str(message),
            LookupOutcome::Found(1) => f.write_str("1 elevation found"),
            LookupOutcome::Found(n) => write!(f, "{} elevations found", n),
            LookupOutcome::NoneFound => f.write_str("No elevations found"),
            LookupOutcome::NothingRequired => {
                f.write_str("Nothing required: all points already have elevations")
            }
        }
    }
}

impl LookupReport {
    /// Number of points that received an elevation.
    pub fn points_updated(&self) -> usize {
        self.updates.len()
    }

    /// All failure messages, one per line, or `None` if there were none.
    pub fn error_message(&self) -> Option<String> {
        join_errors(&self.failures)
    }

    /// Summarise the run.
    pub fn outcome(&self) -> LookupOutcome {
        if self.cancelled {
            LookupOutcome::Cancelled
        } else if let Some(message) = self.error_message() {
            LookupOutcome::Failed(message)
        } else if !self.updates.is_empty() {
            LookupOutcome::Found(self.updates.len())
        } else if !self.tiles.is_empty() {
            LookupOutcome::NoneFound
        } else {
            LookupOutcome::NothingRequired
        }
    }

    /// Restore the altitudes the run replaced.
    pub fn undo(&self, points: &mut [Point]) {
        for update in self.updates.iter().rev() {
            if let Some(point) = points.get_mut(update.index) {
                point.elevation = update.previous;
            }
        }
    }
}

pub(crate) fn join_errors(errors: &[SrtmError]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Fills in missing point elevations from SRTM tiles.
///
/// Sources are tried in the order given: the first source that already has
/// a tile cached supplies it, and on a complete miss the first source that
/// is ready to use downloads it.
#[derive(Debug, Clone)]
pub struct LookupOrchestrator {
    cache: Arc<DiskCache>,
    sources: Vec<Arc<dyn ElevationSource>>,
    state: StateCell,
}

impl LookupOrchestrator {
    /// Create an orchestrator over sources in order of preference.
    pub fn new(cache: Arc<DiskCache>, sources: Vec<Arc<dyn ElevationSource>>) -> Self {
        Self {
            cache,
            sources,
            state: StateCell::default(),
        }
    }

    /// State of the current or last run.
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.state.get().is_active()
    }

    /// Run a lookup on the calling thread.
    ///
    /// `ask_overwrite_zeros` is only called when the points mix zero and
    /// non-zero altitudes. Fails without touching the network if the cache
    /// is unusable or a run is already active.
    pub fn run(
        &self,
        points: &mut [Point],
        kind: TrackKind,
        ask_overwrite_zeros: impl FnOnce() -> bool,
        cancel: &CancelToken,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<LookupReport> {
        let guard = self.state.try_start(RunState::Classifying)?;
        self.execute(guard, points, kind, ask_overwrite_zeros, cancel, progress)
    }

    /// Start a lookup on a worker thread.
    ///
    /// The run owns the points until it finishes and hands them back with
    /// the report. Fails immediately with [`SrtmError::AlreadyRunning`] if a
    /// run is active.
    pub fn begin<F>(
        &self,
        mut points: Vec<Point>,
        kind: TrackKind,
        ask_overwrite_zeros: F,
    ) -> Result<RunHandle<(Vec<Point>, Result<LookupReport>)>>
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let guard = self.state.try_start(RunState::Classifying)?;
        let this = self.clone();
        spawn_run("srtm-lookup", move |cancel, progress| {
            let report = this.execute(guard, &mut points, kind, ask_overwrite_zeros, cancel, progress);
            (points, report)
        })
    }

    fn execute(
        &self,
        guard: RunGuard,
        points: &mut [Point],
        kind: TrackKind,
        ask_overwrite_zeros: impl FnOnce() -> bool,
        cancel: &CancelToken,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<LookupReport> {
        self.cache.require_usable()?;
        if self.sources.is_empty() {
            return Err(SrtmError::Config("no elevation sources configured".to_string()));
        }

        let overwrite_zeros = ZeroPolicy::classify(points).resolve(ask_overwrite_zeros);

        guard.set(RunState::CompilingTiles);
        let tiles = compile_tiles(points, overwrite_zeros);
        tracing::info!(
            "SRTM lookup: {} points, {} tiles, overwrite zeros: {}",
            points.len(),
            tiles.len(),
            overwrite_zeros
        );

        guard.set(RunState::FetchingAndApplying);
        let mut report = LookupReport {
            tiles,
            overwrite_zeros,
            ..Default::default()
        };
        let total = report.tiles.len();
        progress(ProgressEvent::Started { total });

        for index in 0..total {
            if cancel.is_cancelled() {
                break;
            }
            let tile = report.tiles[index];
            match self.fetch(&tile) {
                Ok(grid) => self.apply(&tile, &grid, points, kind, &mut report),
                Err(e) => {
                    tracing::warn!("Tile {} skipped: {}", tile, e);
                    metrics::counter!(TILE_FAILURES).increment(1);
                    report.failures.push(e);
                }
            }
            report.tiles_processed = index + 1;
            progress(ProgressEvent::TileDone {
                index: index + 1,
                total,
                tile,
            });
        }

        report.cancelled = cancel.is_cancelled();
        metrics::counter!(POINTS_UPDATED).increment(report.updates.len() as u64);
        if report.cancelled {
            tracing::info!("SRTM lookup cancelled after {} tiles", report.tiles_processed);
            guard.set(RunState::Cancelled);
        } else {
            tracing::info!("SRTM lookup finished: {}", report.outcome());
            guard.set(RunState::Completed);
        }
        Ok(report)
    }

    /// Get the grid for a tile, downloading it only on a cache miss.
    fn fetch(&self, tile: &TileAddress) -> Result<ElevationGrid> {
        if let Some(source) = self.sources.iter().find(|s| s.is_cached(tile)) {
            tracing::debug!("{} found in {} cache", tile, source.name());
            metrics::counter!(CACHE_HITS).increment(1);
            return source.tile_heights(tile);
        }

        let source = self
            .sources
            .iter()
            .find(|s| s.is_ready_to_use())
            .ok_or(SrtmError::CacheMiss { tile: *tile })?;
        source.download_tile(tile)?;
        source.tile_heights(tile)
    }

    fn apply(
        &self,
        tile: &TileAddress,
        grid: &ElevationGrid,
        points: &mut [Point],
        kind: TrackKind,
        report: &mut LookupReport,
    ) {
        for (index, point) in points.iter_mut().enumerate() {
            if !needs_elevation(point, report.overwrite_zeros) || point.tile() != *tile {
                continue;
            }
            match neighbourhood(grid, *tile, point.lat, point.lon) {
                Ok((samples, alpha, beta)) => {
                    if let Some(value) = interpolate(samples, alpha, beta, kind) {
                        let elevation = Altitude::meters(value);
                        report.updates.push(ElevationUpdate {
                            index,
                            previous: point.elevation,
                            elevation,
                        });
                        point.elevation = Some(elevation);
                    }
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AltitudeUnit;

    fn with_alt(lat: f64, lon: f64, value: f64) -> Point {
        Point::new(lat, lon).with_elevation(Altitude::meters(value))
    }

    #[test]
    fn test_zero_policy() {
        let all_zero = [with_alt(1.0, 1.0, 0.0), Point::new(1.0, 1.0)];
        assert_eq!(ZeroPolicy::classify(&all_zero), ZeroPolicy::Overwrite);

        let none_zero = [with_alt(1.0, 1.0, 12.0), Point::new(1.0, 1.0)];
        assert_eq!(ZeroPolicy::classify(&none_zero), ZeroPolicy::Keep);

        let mixed = [with_alt(1.0, 1.0, 0.0), with_alt(1.0, 1.0, 5.0)];
        assert_eq!(ZeroPolicy::classify(&mixed), ZeroPolicy::AskCaller);

        assert_eq!(ZeroPolicy::classify(&[Point::new(0.0, 0.0)]), ZeroPolicy::Keep);
    }

    #[test]
    fn test_zero_policy_only_asks_when_mixed() {
        let asked = std::cell::Cell::new(false);
        assert!(ZeroPolicy::Overwrite.resolve(|| {
            asked.set(true);
            false
        }));
        assert!(!ZeroPolicy::Keep.resolve(|| {
            asked.set(true);
            true
        }));
        assert!(!asked.get());
        assert!(ZeroPolicy::AskCaller.resolve(|| true));
        assert!(!ZeroPolicy::AskCaller.resolve(|| false));
    }

    #[test]
    fn test_needs_elevation() {
        let feet_zero = Point::new(0.0, 0.0).with_elevation(Altitude {
            value: 0.0,
            unit: AltitudeUnit::Feet,
        });
        assert!(needs_elevation(&Point::new(0.0, 0.0), false));
        assert!(!needs_elevation(&feet_zero, false));
        assert!(needs_elevation(&feet_zero, true));
        assert!(!needs_elevation(&with_alt(0.0, 0.0, 3.0), true));
    }

    #[test]
    fn test_compile_tiles_deduplicates_in_order() {
        let points = [
            Point::new(7.1, 117.1),
            Point::new(7.2, 117.9),
            Point::new(46.5, 8.5),
            Point::new(7.9, 117.0),
            Point::new(46.1, 8.1),
        ];
        assert_eq!(
            compile_tiles(&points, false),
            vec![TileAddress::new(7, 117), TileAddress::new(46, 8)]
        );
    }

    #[test]
    fn test_compile_tiles_skips_points_with_elevation() {
        let points = [with_alt(7.1, 117.1, 20.0), with_alt(46.5, 8.5, 0.0)];
        assert!(compile_tiles(&points, false).is_empty());
        assert_eq!(compile_tiles(&points, true), vec![TileAddress::new(46, 8)]);
    }

    /// 3x3 grid, rows north to south:
    ///   7 8 9
    ///   4 5 6
    ///   1 2 3
    fn grid3() -> ElevationGrid {
        ElevationGrid::new(TileAddress::new(0, 0), 3, vec![7, 8, 9, 4, 5, 6, 1, 2, 3]).unwrap()
    }

    #[test]
    fn test_neighbourhood_south_west_cell() {
        let tile = TileAddress::new(0, 0);
        let (samples, alpha, beta) = neighbourhood(&grid3(), tile, 0.25, 0.25).unwrap();
        assert_eq!(samples, [1, 2, 4, 5]);
        assert!((alpha - 0.5).abs() < 1e-12);
        assert!((beta - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_neighbourhood_north_east_cell() {
        let tile = TileAddress::new(0, 0);
        let (samples, alpha, beta) = neighbourhood(&grid3(), tile, 0.75, 0.75).unwrap();
        assert_eq!(samples, [5, 6, 8, 9]);
        assert!((alpha - 0.5).abs() < 1e-12);
        assert!((beta - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_neighbourhood_south_edge() {
        let tile = TileAddress::new(0, 0);
        let (samples, alpha, beta) = neighbourhood(&grid3(), tile, 0.0, 0.0).unwrap();
        assert_eq!(samples, [1, 2, 4, 5]);
        assert_eq!(alpha, 0.0);
        assert_eq!(beta, 0.0);
        let value = interpolate(samples, alpha, beta, TrackKind::Primary).unwrap();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_neighbourhood_point_outside_tile() {
        let tile = TileAddress::new(0, 0);
        assert!(matches!(
            neighbourhood(&grid3(), tile, 1.5, 0.5),
            Err(SrtmError::TileLookupBounds { .. })
        ));
        assert!(matches!(
            neighbourhood(&grid3(), tile, 0.5, -0.5),
            Err(SrtmError::TileLookupBounds { .. })
        ));
        assert!(neighbourhood(&grid3(), tile, f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_outcome_messages() {
        let mut report = LookupReport::default();
        assert_eq!(report.outcome(), LookupOutcome::NothingRequired);

        report.tiles.push(TileAddress::new(7, 117));
        assert_eq!(report.outcome(), LookupOutcome::NoneFound);

        for index in 0..3 {
            report.updates.push(ElevationUpdate {
                index,
                previous: None,
                elevation: Altitude::meters(1.0),
            });
        }
        assert_eq!(report.outcome(), LookupOutcome::Found(3));
        assert_eq!(report.outcome().to_string(), "3 elevations found");

        report.failures.push(SrtmError::CacheMiss {
            tile: TileAddress::new(8, 117),
        });
        assert_eq!(
            report.outcome(),
            LookupOutcome::Failed("Tile N08E117 not in cache".to_string())
        );

        report.cancelled = true;
        assert_eq!(report.outcome(), LookupOutcome::Cancelled);
    }

    #[test]
    fn test_undo_restores_previous() {
        let mut points = vec![with_alt(1.0, 1.0, 0.0), Point::new(2.0, 2.0)];
        let report = LookupReport {
            updates: vec![
                ElevationUpdate {
                    index: 0,
                    previous: Some(Altitude::meters(0.0)),
                    elevation: Altitude::meters(10.0),
                },
                ElevationUpdate {
                    index: 1,
                    previous: None,
                    elevation: Altitude::meters(20.0),
                },
            ],
            ..Default::default()
        };
        let original = points.clone();
        points[0].elevation = Some(Altitude::meters(10.0));
        points[1].elevation = Some(Altitude::meters(20.0));

        report.undo(&mut points);
        assert_eq!(points, original);
    }
}
