//! Shared HTTP plumbing for the sources.

use crate::telemetry::{BYTES_DOWNLOADED, TILES_DOWNLOADED};
use crate::{Result, SrtmError, TileAddress};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Longest server message kept in an error.
const MAX_ERROR_BODY: usize = 200;

/// Client settings common to every source.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Connect and read timeout.
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("srtm-engine v{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl HttpSettings {
    /// Build a blocking client. With `manual_redirects` the client returns
    /// 3xx responses to the caller instead of following them, and keeps a
    /// cookie jar for the sign-on round trip.
    pub(crate) fn client(&self, manual_redirects: bool) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .connect_timeout(self.timeout);
        if manual_redirects {
            builder = builder
                .redirect(reqwest::redirect::Policy::none())
                .cookie_store(true);
        }
        Ok(builder.build()?)
    }
}

/// Turn a non-200 response into the matching error.
pub(crate) fn status_error(tile: TileAddress, response: Response) -> SrtmError {
    let status = response.status();
    let url = response.url().to_string();
    if status == StatusCode::NOT_FOUND {
        return SrtmError::NotFound { tile, url };
    }

    let mut message = status.canonical_reason().unwrap_or_default().to_string();
    if let Ok(body) = response.text() {
        let body = body.trim();
        if !body.is_empty() {
            let end = body
                .char_indices()
                .nth(MAX_ERROR_BODY)
                .map_or(body.len(), |(i, _)| i);
            message = format!("{} {}", message, &body[..end]).trim().to_string();
        }
    }

    if status == StatusCode::UNAUTHORIZED {
        return SrtmError::Auth(format!("{} rejected the credentials: {}", url, message));
    }
    SrtmError::Network {
        tile,
        status: status.as_u16(),
        message,
    }
}

/// Stream a successful response body into `dest`.
///
/// The body is written to a temporary file in the destination directory and
/// renamed into place once complete, so an interrupted download never
/// leaves a file that looks like a cache hit.
pub(crate) fn save_response(
    tile: TileAddress,
    source_name: &str,
    mut response: Response,
    dest: &Path,
) -> Result<u64> {
    let dir = dest
        .parent()
        .ok_or_else(|| SrtmError::CacheUnusable(format!("{} has no parent", dest.display())))?;
    let expected = response.content_length();

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}", tile.name()))
        .suffix(".part")
        .tempfile_in(dir)?;
    let written = response.copy_to(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;

    if let Some(expected) = expected {
        if expected != written {
            return Err(SrtmError::Network {
                tile,
                status: response.status().as_u16(),
                message: format!("body truncated: got {} of {} bytes", written, expected),
            });
        }
    }

    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;

    metrics::counter!(TILES_DOWNLOADED, "source" => source_name.to_string()).increment(1);
    metrics::counter!(BYTES_DOWNLOADED, "source" => source_name.to_string()).increment(written);
    tracing::info!("Downloaded {} ({} bytes) to {}", tile, written, dest.display());

    Ok(written)
}
