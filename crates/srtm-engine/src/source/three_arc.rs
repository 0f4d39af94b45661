//! SRTM3 v2.1: anonymous, three arc seconds, one directory per continent.

use super::http::{save_response, status_error};
use super::{ElevationSource, HttpSettings};
use crate::grid::THREE_ARC_SECOND_ROW_SIZE;
use crate::{DiskCache, Result, SrtmError, TileAddress};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::path::Path;
use std::sync::Arc;

/// Continent directory names, indexed by the bytes of a [`ContinentTable`].
/// Index 0 means "no tile".
pub const CONTINENTS: [&str; 7] = [
    "",
    "Eurasia",
    "North_America",
    "Australia",
    "Islands",
    "South_America",
    "Africa",
];

/// Southernmost latitude covered by the table.
const TABLE_MIN_LAT: i32 = -59;
/// Northernmost tile latitude covered by the table.
const TABLE_MAX_LAT: i32 = 60;
/// One entry per degree of longitude.
const TABLE_WIDTH: i32 = 360;

/// Map from tile to the continent directory holding it.
///
/// Entry `(lat + 59) * 360 + (lon + 180)` holds an index into
/// [`CONTINENTS`].
#[derive(Clone, PartialEq, Eq)]
pub struct ContinentTable {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ContinentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinentTable")
            .field("len", &self.bytes.len())
            .field("tiles", &self.bytes.iter().filter(|&&b| b != 0).count())
            .finish()
    }
}

impl ContinentTable {
    /// A table with no tiles.
    pub fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Wrap raw table bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Read a binary table file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            SrtmError::Config(format!("cannot read continent table {}: {}", path.display(), e))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Build a table from directory listings.
    ///
    /// Each listing starts with the continent name on its first line,
    /// followed by one tile name (e.g. `N07E117` or `N07E117.hgt.zip`) per
    /// line.
    pub fn from_listings<'a, I>(listings: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let rows = (TABLE_MAX_LAT - TABLE_MIN_LAT + 1) as usize;
        let mut table = Self::from_bytes(vec![0; rows * TABLE_WIDTH as usize]);

        for listing in listings {
            let mut lines = listing.lines().map(str::trim).filter(|l| !l.is_empty());
            let Some(continent) = lines.next() else {
                continue;
            };
            let code = CONTINENTS
                .iter()
                .position(|&c| !c.is_empty() && c == continent)
                .ok_or_else(|| SrtmError::Config(format!("unknown continent '{}'", continent)))?;

            for line in lines {
                let tile: TileAddress = line.parse()?;
                let index = Self::index(&tile)
                    .filter(|&i| i < table.bytes.len())
                    .ok_or_else(|| {
                        SrtmError::Config(format!("tile {} outside the SRTM3 coverage", tile))
                    })?;
                table.bytes[index] = code as u8;
            }
        }

        Ok(table)
    }

    /// Build a table from listing files, one per continent, in the format
    /// accepted by [`from_listings`](Self::from_listings).
    pub fn from_listing_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let listings = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                std::fs::read_to_string(path).map_err(|e| {
                    SrtmError::Config(format!("cannot read tile listing {}: {}", path.display(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_listings(listings.iter().map(String::as_str))
    }

    /// Whether the table maps no tile at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// The raw table bytes, suitable for writing back to a `.dat` file.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Continent directory of a tile, or `None` if the dataset lacks it.
    pub fn continent(&self, tile: &TileAddress) -> Option<&'static str> {
        let code = *self.bytes.get(Self::index(tile)?)?;
        CONTINENTS.get(code as usize).copied().filter(|c| !c.is_empty())
    }

    fn index(tile: &TileAddress) -> Option<usize> {
        let index = (tile.latitude() - TABLE_MIN_LAT) * TABLE_WIDTH + (tile.longitude() + 180);
        usize::try_from(index).ok()
    }
}

/// Anonymous three-arc-second source.
#[derive(Debug)]
pub struct ThreeArcSecondSource {
    cache: Arc<DiskCache>,
    continents: ContinentTable,
    base_url: Url,
    client: Client,
}

impl ThreeArcSecondSource {
    /// Dataset name and cache subdirectory.
    pub const NAME: &'static str = "SRTM3_v21";
    /// Cache file and remote file suffix.
    pub const EXTENSION: &'static str = ".hgt.zip";

    /// Create a source downloading below `base_url`.
    pub fn new(
        cache: Arc<DiskCache>,
        continents: ContinentTable,
        base_url: &str,
        http: &HttpSettings,
    ) -> Result<Self> {
        Ok(Self {
            cache,
            continents,
            base_url: parse_base_url(base_url)?,
            client: http.client(false)?,
        })
    }

    /// Download URL of a tile.
    pub fn tile_url(&self, tile: &TileAddress) -> Result<Url> {
        let continent = self
            .continents
            .continent(tile)
            .ok_or(SrtmError::UncoveredTile { tile: *tile })?;
        self.base_url
            .join(&format!("{}/{}{}", continent, tile.name(), Self::EXTENSION))
            .map_err(|e| SrtmError::Config(format!("cannot build URL for tile {}: {}", tile, e)))
    }
}

impl ElevationSource for ThreeArcSecondSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_ready_to_use(&self) -> bool {
        true
    }

    fn row_size(&self, _tile: &TileAddress) -> usize {
        THREE_ARC_SECOND_ROW_SIZE
    }

    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn cache(&self) -> &DiskCache {
        &self.cache
    }

    fn download_tile(&self, tile: &TileAddress) -> Result<()> {
        let url = self.tile_url(tile)?;
        let dest = self.cache_file(tile)?;
        tracing::debug!("Need to download {}", url);

        let response = self.client.get(url).send()?;
        if response.status() != StatusCode::OK {
            return Err(status_error(*tile, response));
        }
        save_response(*tile, self.name(), response, &dest)?;
        Ok(())
    }
}

/// Parse a URL prefix, making sure it ends in `/` so that joins append.
pub(crate) fn parse_base_url(base: &str) -> Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&base).map_err(|e| SrtmError::Config(format!("invalid URL '{}': {}", base, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(tile: TileAddress, code: u8) -> ContinentTable {
        let mut bytes = vec![0u8; 120 * 360];
        let index = ((tile.latitude() + 59) * 360 + tile.longitude() + 180) as usize;
        bytes[index] = code;
        ContinentTable::from_bytes(bytes)
    }

    #[test]
    fn test_continent_lookup() {
        let table = table_with(TileAddress::new(7, 117), 1);
        assert_eq!(table.continent(&TileAddress::new(7, 117)), Some("Eurasia"));
        assert_eq!(table.continent(&TileAddress::new(7, 118)), None);
    }

    #[test]
    fn test_continent_out_of_bounds() {
        let table = table_with(TileAddress::new(7, 117), 1);
        assert_eq!(table.continent(&TileAddress::new(-60, 0)), None);
        assert_eq!(table.continent(&TileAddress::new(61, 0)), None);
        assert_eq!(table.continent(&TileAddress::new(-59, -181)), None);
        assert_eq!(ContinentTable::empty().continent(&TileAddress::new(7, 117)), None);
    }

    #[test]
    fn test_invalid_code_is_uncovered() {
        let table = table_with(TileAddress::new(0, 0), 42);
        assert_eq!(table.continent(&TileAddress::new(0, 0)), None);
    }

    #[test]
    fn test_from_listings() {
        let eurasia = "Eurasia\nN07E117.hgt.zip\nN47E008\n";
        let south_america = "South_America\n\nS33W071\n";
        let table = ContinentTable::from_listings([eurasia, south_america]).unwrap();

        assert_eq!(table.as_bytes().len(), 120 * 360);
        assert_eq!(table.continent(&TileAddress::new(7, 117)), Some("Eurasia"));
        assert_eq!(table.continent(&TileAddress::new(47, 8)), Some("Eurasia"));
        assert_eq!(table.continent(&TileAddress::new(-33, -71)), Some("South_America"));
        assert_eq!(table.continent(&TileAddress::new(0, 0)), None);
    }

    #[test]
    fn test_from_listing_files() {
        let dir = tempfile::tempdir().unwrap();
        let islands = dir.path().join("Islands.txt");
        std::fs::write(&islands, "Islands\nN07E116.hgt.zip\n").unwrap();

        let table = ContinentTable::from_listing_files(&[&islands]).unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.continent(&TileAddress::new(7, 116)), Some("Islands"));

        let err = ContinentTable::from_listing_files(&[dir.path().join("absent.txt")]).unwrap_err();
        assert!(matches!(err, SrtmError::Config(_)));
        assert!(ContinentTable::empty().is_empty());
    }

    #[test]
    fn test_from_listings_rejects_bad_input() {
        assert!(ContinentTable::from_listings(["Atlantis\nN00E000"]).is_err());
        assert!(ContinentTable::from_listings(["Eurasia\nN75E010"]).is_err());
        assert!(ContinentTable::from_listings(["Eurasia\nnot-a-tile"]).is_err());
    }

    #[test]
    fn test_tile_url() {
        let root = tempfile::tempdir().unwrap();
        let source = ThreeArcSecondSource::new(
            Arc::new(DiskCache::new(root.path())),
            table_with(TileAddress::new(-12, -77), 5),
            "https://dds.cr.usgs.gov/srtm/version2_1/SRTM3",
            &HttpSettings::default(),
        )
        .unwrap();

        assert_eq!(
            source.tile_url(&TileAddress::new(-12, -77)).unwrap().as_str(),
            "https://dds.cr.usgs.gov/srtm/version2_1/SRTM3/South_America/S12W077.hgt.zip"
        );
        assert!(matches!(
            source.tile_url(&TileAddress::new(0, 0)),
            Err(SrtmError::UncoveredTile { .. })
        ));
    }

    #[test]
    fn test_cache_file_layout() {
        let root = tempfile::tempdir().unwrap();
        let source = ThreeArcSecondSource::new(
            Arc::new(DiskCache::new(root.path())),
            ContinentTable::empty(),
            "https://example.invalid/SRTM3/",
            &HttpSettings::default(),
        )
        .unwrap();

        let path = source.cache_file(&TileAddress::new(7, 117)).unwrap();
        assert_eq!(
            path,
            root.path().join("srtm").join("SRTM3_v21").join("N07E117.hgt.zip")
        );
        assert!(!source.is_cached(&TileAddress::new(7, 117)));
        assert_eq!(source.row_size(&TileAddress::new(7, 117)), 1201);
        assert!(source.is_ready_to_use());
    }
}
