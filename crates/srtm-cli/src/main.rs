//! `srtm`: fill in point elevations from SRTM tiles and manage the tile cache.

mod error;
mod points;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use error::{CliError, Result};
use srtm_engine::{
    BoundingBox, BulkDownloadOrchestrator, CancelToken, ContinentTable, Credentials,
    LookupOrchestrator,
    LookupOutcome, ProgressEvent, RunHandle, SourceKind, SrtmConfig, TrackKind,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const DEFAULT_CONFIG: &str = "srtm.yaml";

#[derive(Debug, Parser)]
#[command(name = "srtm", version, about = "SRTM elevation lookup and tile download")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Cache root, overriding the configuration file.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add elevations to the points of a JSON file.
    Lookup(LookupArgs),
    /// Download every tile covering an area into the cache.
    Download(DownloadArgs),
    /// Build the binary SRTM3 continent table from per-continent tile listings.
    Continents {
        /// Listing files: continent name on the first line, then one tile per line.
        #[arg(required = true)]
        listings: Vec<PathBuf>,

        /// Where to write the table.
        #[arg(long, short, default_value = "srtmtiles.dat")]
        output: PathBuf,
    },
    /// Manage Earthdata credentials for the one-arc-second dataset.
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Debug, Args)]
struct LookupArgs {
    /// JSON array of points.
    points: PathBuf,

    /// Where to write the updated points (default: stdout).
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// The points are a generated track: never synthesise values near voids.
    #[arg(long)]
    derived: bool,

    /// What to do with zero altitudes when some points have real ones.
    #[arg(long, value_enum, default_value_t = OverwriteZeros::Ask)]
    overwrite_zeros: OverwriteZeros,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OverwriteZeros {
    Yes,
    No,
    Ask,
}

#[derive(Debug, Args)]
struct DownloadArgs {
    #[arg(long, allow_hyphen_values = true, requires_all = ["max_lat", "min_lon", "max_lon"])]
    min_lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    max_lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    min_lon: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    max_lon: Option<f64>,

    /// Use the bounding box of the points in this JSON file.
    #[arg(long, conflicts_with = "min_lat")]
    points: Option<PathBuf>,

    /// Dataset to download (default: first configured source).
    #[arg(long)]
    source: Option<SourceKind>,
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Check and store credentials.
    Set {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Check the stored credentials.
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filters = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let filter_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filters);
    tracing_subscriber::registry().with(filter_layer).init();
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = SrtmConfig::load(&cli.config)?;
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }
    srtm_engine::describe_metrics();

    match cli.command {
        Command::Lookup(args) => lookup(&config, args),
        Command::Download(args) => download(&config, args),
        Command::Continents { listings, output } => continents(&listings, &output),
        Command::Auth {
            command: AuthCommand::Set { username, password },
        } => auth_set(config, &cli.config, &username, &password),
        Command::Auth {
            command: AuthCommand::Check,
        } => auth_check(&config),
    }
}

fn lookup(config: &SrtmConfig, args: LookupArgs) -> Result<()> {
    let points = points::read_points(&args.points)?;
    let cache = Arc::new(config.disk_cache());
    let orchestrator = LookupOrchestrator::new(cache.clone(), config.sources(cache)?);

    let kind = if args.derived {
        TrackKind::Derived
    } else {
        TrackKind::Primary
    };
    let policy = args.overwrite_zeros;
    let handle = orchestrator.begin(points, kind, move || match policy {
        OverwriteZeros::Yes => true,
        OverwriteZeros::No => false,
        OverwriteZeros::Ask => confirm("Some points have zero altitude. Replace those too?"),
    })?;

    let (points, report) = watch(handle)?;
    let report = report?;
    points::write_points(&points, args.output.as_deref())?;

    match report.outcome() {
        LookupOutcome::Failed(message) => Err(CliError::Incomplete(message)),
        outcome => {
            tracing::info!("{}", outcome);
            Ok(())
        }
    }
}

fn download(config: &SrtmConfig, args: DownloadArgs) -> Result<()> {
    let bbox = match (&args.points, args.min_lat, args.max_lat, args.min_lon, args.max_lon) {
        (Some(path), ..) => BoundingBox::from_points(&points::read_points(path)?)?
            .ok_or_else(|| CliError::Usage(format!("{} holds no points", path.display())))?,
        (None, Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) => {
            BoundingBox::new(min_lat, max_lat, min_lon, max_lon)?
        }
        _ => {
            return Err(CliError::Usage(
                "give --points or all of --min-lat, --max-lat, --min-lon, --max-lon".to_string(),
            ))
        }
    };

    let kind = args
        .source
        .or_else(|| config.sources.first().copied())
        .unwrap_or(SourceKind::ThreeArcSecond);
    let cache = Arc::new(config.disk_cache());
    let orchestrator = BulkDownloadOrchestrator::new(config.source(kind, cache)?);

    let report = watch(orchestrator.begin(bbox)?)??;
    tracing::info!("{}", report);
    match report.error_message() {
        Some(message) if !report.cancelled => Err(CliError::Incomplete(message)),
        _ => Ok(()),
    }
}

fn continents(listings: &[PathBuf], output: &std::path::Path) -> Result<()> {
    let table = ContinentTable::from_listing_files(listings)?;
    std::fs::write(output, table.as_bytes())?;
    tracing::info!(
        "Continent table from {} listings written to {}",
        listings.len(),
        output.display()
    );
    Ok(())
}

fn auth_set(
    mut config: SrtmConfig,
    config_path: &std::path::Path,
    username: &str,
    password: &str,
) -> Result<()> {
    let credentials = Credentials::new(username, password);
    check_credentials(&config, &credentials)?;
    config.set_credentials(&credentials);
    config.save(config_path)?;
    tracing::info!("Credentials for {} saved to {}", username, config_path.display());
    Ok(())
}

fn auth_check(config: &SrtmConfig) -> Result<()> {
    let credentials = config
        .credentials()?
        .ok_or_else(|| CliError::Usage("no credentials stored; run `srtm auth set`".to_string()))?;
    check_credentials(config, &credentials)?;
    tracing::info!("Credentials for {} accepted", credentials.username()?);
    Ok(())
}

fn check_credentials(config: &SrtmConfig, credentials: &Credentials) -> Result<()> {
    let cache = Arc::new(config.disk_cache());
    cache.require_usable()?;
    let source = config.one_arc_second_source(cache)?;
    tracing::info!("Checking credentials with {}", config.endpoints.auth_host);
    source.test_auth(credentials)?;
    Ok(())
}

/// Relay progress to the log until the run ends, cancelling on Ctrl-C.
fn watch<T>(handle: RunHandle<T>) -> Result<T> {
    let cancel: CancelToken = handle.cancel_token();
    // One handler per process: a second run in the same process keeps the first.
    match ctrlc::set_handler(move || {
        tracing::warn!("Interrupted, stopping after the current tile");
        cancel.cancel();
    }) {
        Ok(()) | Err(ctrlc::Error::MultipleHandlers) => {}
        Err(e) => return Err(e.into()),
    }

    for event in handle.progress().iter() {
        match event {
            ProgressEvent::Started { total } => tracing::info!("{} tiles to process", total),
            ProgressEvent::TileDone { index, total, tile } => {
                tracing::info!("[{}/{}] {}", index, total, tile)
            }
        }
    }
    handle.join().map_err(|_| CliError::WorkerPanicked)
}

fn confirm(question: &str) -> bool {
    eprint!("{} [y/N] ", question);
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
