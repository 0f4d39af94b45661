//! Errors reported by the `srtm` command.

use srtm_engine::SrtmError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop an `srtm` command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure reported by the engine.
    #[error(transparent)]
    Srtm(#[from] SrtmError),

    /// The points file could not be read.
    #[error("Cannot read {}: {source}", path.display())]
    ReadPoints {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The points file is not a JSON array of points.
    #[error("Invalid points file {}: {source}", path.display())]
    ParsePoints {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error with line and column.
        source: serde_json::Error,
    },

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialising points failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The Ctrl-C handler could not be installed.
    #[error("Cannot install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// The run finished but some tiles or points failed.
    #[error("{0}")]
    Incomplete(String),

    /// The background run died without a result.
    #[error("Worker thread panicked")]
    WorkerPanicked,

    /// Arguments clap cannot check on its own.
    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
