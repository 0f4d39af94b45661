//! Metric names published through the `metrics` facade.
//!
//! Nothing is recorded unless the host application installs a recorder.

use metrics::{describe_counter, Unit};

/// Tiles downloaded into the cache, labelled by `source`.
pub const TILES_DOWNLOADED: &str = "srtm.tiles.downloaded";

/// Bytes written to the cache by downloads, labelled by `source`.
pub const BYTES_DOWNLOADED: &str = "srtm.bytes.downloaded";

/// Tiles found in the cache without any network access.
pub const CACHE_HITS: &str = "srtm.cache.hits";

/// Tiles that failed to download or decode.
pub const TILE_FAILURES: &str = "srtm.tiles.failed";

/// Points given an elevation by a lookup.
pub const POINTS_UPDATED: &str = "srtm.points.updated";

/// Register descriptions for every metric above.
pub fn describe_metrics() {
    describe_counter!(TILES_DOWNLOADED, Unit::Count, "Tiles downloaded into the disk cache");
    describe_counter!(BYTES_DOWNLOADED, Unit::Bytes, "Bytes of tile archives downloaded");
    describe_counter!(CACHE_HITS, Unit::Count, "Tiles served from the disk cache");
    describe_counter!(TILE_FAILURES, Unit::Count, "Tiles that failed to download or decode");
    describe_counter!(POINTS_UPDATED, Unit::Count, "Points given an SRTM elevation");
}
