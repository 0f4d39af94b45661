//! Example: Look up the elevation of a few points.
//!
//! Usage: cargo run --example lookup_points -- <cache_dir> <lat,lon>...

use srtm_engine::{CancelToken, LookupOrchestrator, Point, ProgressEvent, SrtmConfig, TrackKind};
use std::env;
use std::sync::Arc;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <cache_dir> <lat,lon>...", args[0]);
        eprintln!("Example: {} ./srtm_cache 7.25,117.5 46.55,8.56", args[0]);
        std::process::exit(1);
    }

    let mut points: Vec<Point> = args[2..]
        .iter()
        .map(|arg| {
            let (lat, lon) = arg.split_once(',').expect("Expected <lat,lon>");
            Point::new(
                lat.trim().parse().expect("Invalid latitude"),
                lon.trim().parse().expect("Invalid longitude"),
            )
        })
        .collect();

    let config = SrtmConfig {
        cache_dir: Some(args[1].clone().into()),
        ..SrtmConfig::default()
    };
    let cache = Arc::new(config.disk_cache());
    let sources = config.sources(cache.clone()).expect("Failed to set up sources");
    let lookup = LookupOrchestrator::new(cache, sources);

    println!("Looking up {} points...", points.len());
    let start = Instant::now();

    let report = lookup
        .run(
            &mut points,
            TrackKind::Primary,
            || true,
            &CancelToken::new(),
            &|event| {
                if let ProgressEvent::TileDone { index, total, tile } = event {
                    println!("  [{}/{}] {}", index, total, tile);
                }
            },
        )
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    for point in &points {
        match point.elevation {
            Some(elevation) => println!("({}, {}): {:.1} m", point.lat, point.lon, elevation.value),
            None => println!("({}, {}): no data", point.lat, point.lon),
        }
    }
    println!("{} in {:.2}s", report.outcome(), start.elapsed().as_secs_f64());
}
