//! On-disk tile cache layout.
//!
//! Tiles live under `<cache_root>/srtm/<source_name>/<tile_name><extension>`.
//! A [`DiskCache`] is built once from the configured cache root and shared
//! (behind an `Arc`) by every source and orchestrator. The `srtm` directory
//! is resolved on first successful use and remembered, so repeated checks
//! are cheap. A failed check is retried on the next call.

use crate::{Result, SrtmError};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the subdirectory of the cache root holding all SRTM data.
pub const SRTM_DIR_NAME: &str = "srtm";

/// Disk cache context for downloaded tiles.
#[derive(Debug)]
pub struct DiskCache {
    /// Configured cache root, if any.
    root: Option<PathBuf>,
    /// Resolved `srtm` directory, `None` until it has been created.
    srtm_dir: Mutex<Option<PathBuf>>,
}

impl DiskCache {
    /// Create a cache context rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
            srtm_dir: Mutex::new(None),
        }
    }

    /// A cache with no configured root. It is never usable.
    pub fn unconfigured() -> Self {
        Self {
            root: None,
            srtm_dir: Mutex::new(None),
        }
    }

    /// The configured cache root.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Check that the `srtm` directory exists or can be created.
    ///
    /// Success is remembered; after a failure the next call tries again.
    pub fn ensure_usable(&self) -> bool {
        self.srtm_dir().is_some()
    }

    /// Like [`ensure_usable`](Self::ensure_usable) but with an error
    /// describing why the cache cannot be used.
    pub fn require_usable(&self) -> Result<PathBuf> {
        match (&self.root, self.srtm_dir()) {
            (_, Some(dir)) => Ok(dir),
            (None, None) => Err(SrtmError::CacheUnusable(
                "no cache directory configured".to_string(),
            )),
            (Some(root), None) => Err(SrtmError::CacheUnusable(format!(
                "cannot create {}",
                root.join(SRTM_DIR_NAME).display()
            ))),
        }
    }

    /// Directory holding the tiles of one source, created on demand.
    pub fn directory_for(&self, source_name: &str) -> Result<PathBuf> {
        let dir = self.require_usable()?.join(source_name);
        create_dir_idempotent(&dir).map_err(|e| {
            SrtmError::CacheUnusable(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    fn srtm_dir(&self) -> Option<PathBuf> {
        let mut resolved = self.srtm_dir.lock();
        if let Some(dir) = resolved.as_ref() {
            return Some(dir.clone());
        }
        let dir = self.root.as_ref()?.join(SRTM_DIR_NAME);
        match create_dir_idempotent(&dir) {
            Ok(()) => {
                *resolved = Some(dir.clone());
                Some(dir)
            }
            Err(e) => {
                tracing::warn!("SRTM cache directory {} unusable: {}", dir.display(), e);
                None
            }
        }
    }
}

/// Create a directory, treating "already exists" as success so that
/// concurrent runs can race on it.
fn create_dir_idempotent(dir: &Path) -> std::io::Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}
