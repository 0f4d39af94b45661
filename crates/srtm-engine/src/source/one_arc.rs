//! SRTMGL1 v003: one arc second, behind an Earthdata login.
//!
//! A tile request is answered with a redirect to the single sign-on host,
//! which authenticates and redirects back to the data host. Redirects are
//! followed by hand so that the `Authorization` header is only ever sent to
//! the sign-on host and never to the data server.

use super::http::{save_response, status_error};
use super::three_arc::parse_base_url;
use super::{ElevationSource, HttpSettings};
use crate::grid::ONE_ARC_SECOND_ROW_SIZE;
use crate::{Credentials, DiskCache, Result, SrtmError, TileAddress};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{StatusCode, Url};
use std::sync::Arc;

/// Maximum number of requests made for one tile, redirects included.
pub const MAX_REDIRECTS: usize = 10;

/// Smallest tile of the dataset (a few islands off Malaysia), used to check
/// credentials.
pub const AUTH_TEST_TILE: TileAddress = TileAddress::new(7, 117);

/// Authenticated one-arc-second source.
#[derive(Debug)]
pub struct OneArcSecondSource {
    cache: Arc<DiskCache>,
    credentials: Option<Credentials>,
    base_url: Url,
    auth_host: String,
    client: Client,
}

impl OneArcSecondSource {
    /// Dataset name and cache subdirectory.
    pub const NAME: &'static str = "SRTMGL1_v003";
    /// Cache file and remote file suffix.
    pub const EXTENSION: &'static str = ".SRTMGL1.hgt.zip";

    /// Create a source downloading below `base_url`, authenticating against
    /// `auth_host`.
    pub fn new(
        cache: Arc<DiskCache>,
        credentials: Option<Credentials>,
        base_url: &str,
        auth_host: &str,
        http: &HttpSettings,
    ) -> Result<Self> {
        Ok(Self {
            cache,
            credentials,
            base_url: parse_base_url(base_url)?,
            auth_host: auth_host.to_string(),
            client: http.client(true)?,
        })
    }

    /// Download URL of a tile.
    pub fn tile_url(&self, tile: &TileAddress) -> Result<Url> {
        self.base_url
            .join(&format!("{}{}", tile.name(), Self::EXTENSION))
            .map_err(|e| SrtmError::Config(format!("cannot build URL for tile {}: {}", tile, e)))
    }

    /// Check credentials by downloading [`AUTH_TEST_TILE`].
    ///
    /// Any cached copy is deleted first, so the check always reaches the
    /// server.
    pub fn test_auth(&self, credentials: &Credentials) -> Result<()> {
        let path = self.cache_file(&AUTH_TEST_TILE)?;
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed cached {} before credential check", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.download_with(&AUTH_TEST_TILE, credentials)
    }

    fn download_with(&self, tile: &TileAddress, credentials: &Credentials) -> Result<()> {
        let dest = self.cache_file(tile)?;
        let mut url = self.tile_url(tile)?;
        tracing::debug!("Need to download {}", url);

        for _ in 0..MAX_REDIRECTS {
            let mut request = self.client.get(url.clone());
            if url.host_str() == Some(self.auth_host.as_str()) {
                request = request.header(AUTHORIZATION, credentials.header_value());
            }

            let response = request.send()?;
            let status = response.status();
            if status == StatusCode::OK {
                save_response(*tile, self.name(), response, &dest)?;
                return Ok(());
            }
            if !status.is_redirection() {
                return Err(status_error(*tile, response));
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| SrtmError::Network {
                    tile: *tile,
                    status: status.as_u16(),
                    message: "redirect without Location header".to_string(),
                })?;
            let next = url.join(location).map_err(|e| SrtmError::Network {
                tile: *tile,
                status: status.as_u16(),
                message: format!("bad redirect target '{}': {}", location, e),
            })?;
            tracing::debug!("Redirected from {} to {}", url, next);
            url = next;
        }

        Err(SrtmError::Network {
            tile: *tile,
            status: StatusCode::FOUND.as_u16(),
            message: format!("gave up after {} redirects", MAX_REDIRECTS),
        })
    }
}

impl ElevationSource for OneArcSecondSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_ready_to_use(&self) -> bool {
        self.credentials.is_some()
    }

    fn row_size(&self, _tile: &TileAddress) -> usize {
        ONE_ARC_SECOND_ROW_SIZE
    }

    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn cache(&self) -> &DiskCache {
        &self.cache
    }

    fn download_tile(&self, tile: &TileAddress) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| SrtmError::Auth("no Earthdata credentials configured".to_string()))?;
        self.download_with(tile, credentials)
    }
}
