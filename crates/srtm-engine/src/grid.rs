//! Decoded SRTM elevation grids.

use crate::{Result, SrtmError, TileAddress};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Sample value marking a hole in the SRTM data.
pub const VOID_VALUE: i16 = -32768;

/// Row size of three-arc-second tiles.
pub const THREE_ARC_SECOND_ROW_SIZE: usize = 1201;

/// Row size of one-arc-second tiles.
pub const ONE_ARC_SECOND_ROW_SIZE: usize = 3601;

/// A square grid of elevation samples in meters.
///
/// Samples are stored row-major, north to south, west to east. Row 0 is the
/// northern edge of the tile and the last row is its southern edge.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    row_size: usize,
    samples: Vec<i16>,
}

impl ElevationGrid {
    /// Build a grid from raw samples.
    ///
    /// Fails when `samples.len() != row_size²`.
    pub fn new(tile: TileAddress, row_size: usize, samples: Vec<i16>) -> Result<Self> {
        if samples.len() != row_size * row_size {
            return Err(SrtmError::CorruptTile {
                tile,
                path: Default::default(),
                reason: format!(
                    "expected {} samples, got {}",
                    row_size * row_size,
                    samples.len()
                ),
            });
        }
        Ok(Self { row_size, samples })
    }

    /// Decode a cached tile archive.
    ///
    /// The archive must hold a single entry of exactly `2 * row_size²`
    /// bytes: big-endian 16-bit two's-complement samples.
    pub fn from_archive(tile: TileAddress, path: &Path, row_size: usize) -> Result<Self> {
        let corrupt = |reason: String| SrtmError::CorruptTile {
            tile,
            path: path.to_path_buf(),
            reason,
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SrtmError::CacheMiss { tile })
            }
            Err(e) => return Err(e.into()),
        };

        let mut archive =
            zip::ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
        let mut entry = archive.by_index(0).map_err(|e| corrupt(e.to_string()))?;

        let expected = 2 * row_size * row_size;
        if entry.size() != expected as u64 {
            return Err(corrupt(format!(
                "entry {} has {} bytes, expected {}",
                entry.name(),
                entry.size(),
                expected
            )));
        }

        let mut bytes = Vec::with_capacity(expected);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| corrupt(e.to_string()))?;
        if bytes.len() != expected {
            return Err(corrupt(format!(
                "read {} bytes, expected {}",
                bytes.len(),
                expected
            )));
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self { row_size, samples })
    }

    /// Number of samples along each edge.
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the grid holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at a flat row-major index, or `None` outside the grid.
    pub fn sample(&self, index: usize) -> Option<i16> {
        self.samples.get(index).copied()
    }

    /// Sample at a row and column, or `None` outside the grid.
    pub fn at(&self, row: usize, col: usize) -> Option<i16> {
        if row >= self.row_size || col >= self.row_size {
            return None;
        }
        self.sample(row * self.row_size + col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path, name: &str, bytes: &[u8]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_decode_big_endian_signed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N00E000.hgt.zip");
        // 2x2 grid: 1, 300, -1, void
        let bytes = [0x00, 0x01, 0x01, 0x2C, 0xFF, 0xFF, 0x80, 0x00];
        write_archive(&path, "N00E000.hgt", &bytes);

        let grid = ElevationGrid::from_archive(TileAddress::new(0, 0), &path, 2).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.at(0, 0), Some(1));
        assert_eq!(grid.at(0, 1), Some(300));
        assert_eq!(grid.at(1, 0), Some(-1));
        assert_eq!(grid.at(1, 1), Some(VOID_VALUE));
        assert_eq!(grid.at(2, 0), None);
    }

    #[test]
    fn test_size_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N00E000.hgt.zip");
        write_archive(&path, "N00E000.hgt", &[0u8; 6]);

        let err = ElevationGrid::from_archive(TileAddress::new(0, 0), &path, 2).unwrap_err();
        assert!(matches!(err, SrtmError::CorruptTile { .. }), "{err}");
    }

    #[test]
    fn test_not_an_archive_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N00E000.hgt.zip");
        std::fs::write(&path, b"truncated download").unwrap();

        let err = ElevationGrid::from_archive(TileAddress::new(0, 0), &path, 2).unwrap_err();
        assert!(matches!(err, SrtmError::CorruptTile { .. }), "{err}");
    }

    #[test]
    fn test_missing_file_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N00E000.hgt.zip");

        let err = ElevationGrid::from_archive(TileAddress::new(0, 0), &path, 2).unwrap_err();
        assert!(matches!(err, SrtmError::CacheMiss { .. }));
    }

    #[test]
    fn test_new_checks_length() {
        assert!(ElevationGrid::new(TileAddress::new(0, 0), 2, vec![0; 4]).is_ok());
        assert!(ElevationGrid::new(TileAddress::new(0, 0), 2, vec![0; 5]).is_err());
    }
}
