//! YAML configuration for the SRTM engine.
//!
//! ```yaml
//! cache_dir: /home/me/.cache/gpsmaps
//! earthdata_auth: dXNlcjpwYXNz
//! timeout_secs: 60
//! continent_table: /usr/share/srtm/srtmtiles.dat
//! continent_listings: []
//! sources: [srtm-gl1, srtm3]
//! ```
//!
//! Every key is optional.

use crate::source::{
    ContinentTable, ElevationSource, HttpSettings, OneArcSecondSource, SourceKind,
    ThreeArcSecondSource,
};
use crate::{Credentials, DiskCache, Result, SrtmError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default three-arc-second URL prefix.
pub const DEFAULT_THREE_ARC_URL: &str = "https://dds.cr.usgs.gov/srtm/version2_1/SRTM3/";

/// Default one-arc-second URL prefix.
pub const DEFAULT_ONE_ARC_URL: &str =
    "https://e4ftl01.cr.usgs.gov/MEASURES/SRTMGL1.003/2000.02.11/";

/// Default Earthdata single sign-on host.
pub const DEFAULT_AUTH_HOST: &str = "urs.earthdata.nasa.gov";

/// Remote endpoints of the two datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// URL prefix of the three-arc-second dataset (continent directories below it).
    pub three_arc_url: String,
    /// URL prefix of the one-arc-second dataset.
    pub one_arc_url: String,
    /// Host of the single sign-on server; the only host that sees credentials.
    pub auth_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            three_arc_url: DEFAULT_THREE_ARC_URL.to_string(),
            one_arc_url: DEFAULT_ONE_ARC_URL.to_string(),
            auth_host: DEFAULT_AUTH_HOST.to_string(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrtmConfig {
    /// Root of the disk cache. Tiles go below `<cache_dir>/srtm/`.
    pub cache_dir: Option<PathBuf>,
    /// Earthdata credentials as `base64(username:password)`.
    pub earthdata_auth: Option<String>,
    /// HTTP connect and read timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Binary continent lookup table for the three-arc-second dataset.
    pub continent_table: Option<PathBuf>,
    /// Per-continent tile listings, used when no binary table is given.
    /// Each file names its continent on the first line, then one tile per line.
    pub continent_listings: Vec<PathBuf>,
    /// Sources in order of preference for lookups.
    pub sources: Vec<SourceKind>,
    /// Remote endpoints.
    pub endpoints: Endpoints,
}

impl Default for SrtmConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            earthdata_auth: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("srtm-engine v{}", env!("CARGO_PKG_VERSION")),
            continent_table: None,
            continent_listings: Vec::new(),
            sources: vec![SourceKind::OneArcSecond, SourceKind::ThreeArcSecond],
            endpoints: Endpoints::default(),
        }
    }
}

impl SrtmConfig {
    /// Load configuration from a YAML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_yaml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(SrtmError::Config("timeout_secs must be positive".to_string()));
        }
        if self.sources.is_empty() {
            return Err(SrtmError::Config("at least one source is required".to_string()));
        }
        Ok(())
    }

    /// Stored Earthdata credentials, if any.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        self.earthdata_auth
            .as_deref()
            .map(Credentials::from_encoded)
            .transpose()
    }

    /// Replace the stored Earthdata credentials.
    pub fn set_credentials(&mut self, credentials: &Credentials) {
        self.earthdata_auth = Some(credentials.encoded().to_string());
    }

    /// Build the disk cache context for the configured root.
    pub fn disk_cache(&self) -> DiskCache {
        match &self.cache_dir {
            Some(dir) => DiskCache::new(dir),
            None => DiskCache::unconfigured(),
        }
    }

    /// HTTP client settings.
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// The continent table: the binary file if configured, otherwise one
    /// built from the listings.
    pub fn continent_table(&self) -> Result<ContinentTable> {
        let table = match &self.continent_table {
            Some(path) => ContinentTable::from_file(path)?,
            None if !self.continent_listings.is_empty() => {
                ContinentTable::from_listing_files(&self.continent_listings)?
            }
            None => ContinentTable::empty(),
        };
        if table.is_empty() {
            tracing::warn!("No continent table configured, SRTM3 tiles cannot be downloaded");
        }
        Ok(table)
    }

    /// The three-arc-second source described by this configuration.
    pub fn three_arc_second_source(&self, cache: Arc<DiskCache>) -> Result<ThreeArcSecondSource> {
        ThreeArcSecondSource::new(
            cache,
            self.continent_table()?,
            &self.endpoints.three_arc_url,
            &self.http_settings(),
        )
    }

    /// The one-arc-second source described by this configuration.
    pub fn one_arc_second_source(&self, cache: Arc<DiskCache>) -> Result<OneArcSecondSource> {
        OneArcSecondSource::new(
            cache,
            self.credentials()?,
            &self.endpoints.one_arc_url,
            &self.endpoints.auth_host,
            &self.http_settings(),
        )
    }

    /// Build one source.
    pub fn source(&self, kind: SourceKind, cache: Arc<DiskCache>) -> Result<Arc<dyn ElevationSource>> {
        Ok(match kind {
            SourceKind::ThreeArcSecond => Arc::new(self.three_arc_second_source(cache)?),
            SourceKind::OneArcSecond => Arc::new(self.one_arc_second_source(cache)?),
        })
    }

    /// Build all configured sources in preference order.
    pub fn sources(&self, cache: Arc<DiskCache>) -> Result<Vec<Arc<dyn ElevationSource>>> {
        self.sources
            .iter()
            .map(|&kind| self.source(kind, Arc::clone(&cache)))
            .collect()
    }
}
