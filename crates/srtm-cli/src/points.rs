//! JSON point files: an array of `{"lat": .., "lon": .., "elevation": {"value": .., "unit": ..}}`.

use crate::error::{CliError, Result};
use srtm_engine::Point;
use std::io::Write;
use std::path::Path;

/// Read a JSON array of points.
pub fn read_points(path: &Path) -> Result<Vec<Point>> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadPoints {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::ParsePoints {
        path: path.to_path_buf(),
        source,
    })
}

/// Write points as pretty JSON to `path`, or to stdout.
pub fn write_points(points: &[Point], path: Option<&Path>) -> Result<()> {
    let mut json = serde_json::to_string_pretty(points)?;
    json.push('\n');
    match path {
        Some(path) => std::fs::write(path, json)?,
        None => std::io::stdout().lock().write_all(json.as_bytes())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use srtm_engine::{Altitude, AltitudeUnit};

    #[test]
    fn test_read_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(
            &path,
            r#"[
                {"lat": 7.25, "lon": 117.5},
                {"latitude": 46.5, "longitude": 8.5, "altitude": {"value": 0}},
                {"lat": 1, "lon": 2, "elevation": {"value": 100, "unit": "feet"}}
            ]"#,
        )
        .unwrap();

        let points = read_points(&path).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], Point::new(7.25, 117.5));
        assert_eq!(points[1].elevation, Some(Altitude::meters(0.0)));
        assert_eq!(points[2].elevation.unwrap().unit, AltitudeUnit::Feet);
    }

    #[test]
    fn test_read_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{\"lat\": 1}]").unwrap();

        let err = read_points(&path).unwrap_err();
        assert!(matches!(err, CliError::ParsePoints { .. }));
        assert!(err.to_string().contains("broken.json"));

        let err = read_points(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CliError::ReadPoints { .. }));
    }

    #[test]
    fn test_write_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let points = vec![
            Point::new(7.25, 117.5).with_elevation(Altitude::meters(912.5)),
            Point::new(7.5, 117.5),
        ];
        write_points(&points, Some(&path)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"unit\": \"meters\""));
        assert_eq!(read_points(&path).unwrap(), points);
    }
}
