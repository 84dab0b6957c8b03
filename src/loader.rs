//! Survey Directory Loader
//!
//! Adapts on-disk per-survey files into the engine's input contract.
//! Files follow the upstream naming convention `"<YEAR> - <Pipeline
//! Name>.<ext>"`; the year prefix orders the sequence chronologically and
//! the earliest file becomes the baseline.
//!
//! Two canonical formats are accepted:
//!
//! **JSON** — a serialized array of [`AnomalyDetection`] records, the
//! engine-native schema.
//!
//! **CSV** — the canonical header the upstream formatter emits
//! (`feature_id, distance, odometer, joint_number, relative_position,
//! angle, feature_type, depth_percent, length, width, wall_thickness,
//! weld_type, elevation`, plus optional `j_len`). Columns are located by
//! header name, rows with unparseable numerics are skipped with a
//! warning, and two vendor quirks are normalised here so the engine never
//! sees them: o'clock angle strings ("4:30") become degrees, and
//! depth values above 1 are treated as percentages.

use crate::types::{AnomalyDetection, FeatureType, Survey};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("survey I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("survey JSON error ({0}): {1}")]
    Json(PathBuf, #[source] serde_json::Error),
    #[error("survey CSV {0} has no header row")]
    MissingHeader(PathBuf),
    #[error("survey CSV {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("no survey files matching '<YEAR> - <name>.json|csv' found in {0}")]
    NoSurveys(PathBuf),
}

/// Load every survey file in a directory, sorted chronologically.
///
/// Files whose names carry no leading year are skipped with a warning —
/// directories routinely hold readme/output files next to the surveys.
pub fn load_survey_dir(dir: &Path) -> Result<Vec<Survey>, LoaderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LoaderError::Io(dir.to_path_buf(), e))?;

    let mut surveys = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LoaderError::Io(dir.to_path_buf(), e))?;
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(ext.as_deref(), Some("json" | "csv")) {
            continue;
        }
        let Some(year) = year_from_file_name(&path) else {
            warn!(file = %path.display(), "no '<YEAR> - ' prefix — skipping file");
            continue;
        };
        surveys.push(load_survey_file(&path, year)?);
    }

    if surveys.is_empty() {
        return Err(LoaderError::NoSurveys(dir.to_path_buf()));
    }
    surveys.sort_by_key(|s| s.year);
    Ok(surveys)
}

/// Load a single survey file (JSON or CSV by extension).
pub fn load_survey_file(path: &Path, year: i32) -> Result<Survey, LoaderError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let detections = if is_json {
        let file = File::open(path).map_err(|e| LoaderError::Io(path.to_path_buf(), e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| LoaderError::Json(path.to_path_buf(), e))?
    } else {
        load_csv_detections(path)?
    };

    debug!(file = %path.display(), year, detections = detections.len(), "loaded survey");
    Ok(Survey::new(year, detections))
}

/// Parse the leading year from `"<YEAR> - <name>.<ext>"`.
fn year_from_file_name(path: &Path) -> Option<i32> {
    let stem = path.file_stem()?.to_str()?;
    let prefix = stem.split(" - ").next()?;
    prefix.trim().parse::<i32>().ok()
}

// ============================================================================
// Canonical CSV parsing
// ============================================================================

fn load_csv_detections(path: &Path) -> Result<Vec<AnomalyDetection>, LoaderError> {
    let file = File::open(path).map_err(|e| LoaderError::Io(path.to_path_buf(), e))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .ok_or_else(|| LoaderError::MissingHeader(path.to_path_buf()))?
        .map_err(|e| LoaderError::Io(path.to_path_buf(), e))?;
    let columns = column_map(&header);

    // Only these two are structurally required; everything else is optional
    // with central defaults.
    for required in ["distance", "feature_type"] {
        if !columns.contains_key(required) {
            return Err(LoaderError::MissingColumn {
                path: path.to_path_buf(),
                column: required.to_string(),
            });
        }
    }

    let mut detections = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let line = line.map_err(|e| LoaderError::Io(path.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(&line);
        match parse_detection_row(&fields, &columns) {
            Some(d) => detections.push(d),
            None => {
                warn!(
                    file = %path.display(),
                    line = line_no + 2,
                    "unparseable detection row — skipping"
                );
            }
        }
    }
    Ok(detections)
}

/// header name (lowercased, trimmed) → column index
fn column_map(header: &str) -> HashMap<String, usize> {
    split_csv_line(header)
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
        .collect()
}

/// Minimal quote-aware CSV field split (canonical files never nest quotes).
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_detection_row(
    fields: &[String],
    columns: &HashMap<String, usize>,
) -> Option<AnomalyDetection> {
    let text = |name: &str| -> Option<&str> {
        let idx = *columns.get(name)?;
        let value = fields.get(idx)?.trim();
        (!value.is_empty()).then_some(value)
    };
    let number = |name: &str| -> Option<f64> { text(name)?.parse::<f64>().ok() };

    let distance = number("distance")?;
    let feature_type = FeatureType::from(text("feature_type")?.to_string());

    // Depth above 1 is a raw percentage the formatter did not rescale.
    let depth_percent = number("depth_percent").map(|d| if d > 1.0 { d / 100.0 } else { d });

    // The angle column may carry an o'clock string from older vendors.
    let angle = match text("angle") {
        Some(raw) => raw.parse::<f64>().ok().or_else(|| clock_to_degrees(raw)),
        None => None,
    };

    Some(AnomalyDetection {
        feature_id: text("feature_id").map(str::to_string),
        distance,
        joint_number: text("joint_number").and_then(|v| v.parse::<f64>().ok().map(|n| n as i64)),
        relative_position: number("relative_position"),
        angle,
        feature_type,
        depth_percent,
        length: number("length"),
        width: number("width"),
        wall_thickness: number("wall_thickness"),
        elevation: number("elevation"),
        j_len: number("j_len"),
        remaining_strength_ratio: number("remaining_strength_ratio"),
    })
}

/// Convert a clock-position string ("4:30") to degrees:
/// hours·30 + minutes·0.5.
pub fn clock_to_degrees(s: &str) -> Option<f64> {
    let (hours, minutes) = s.trim().split_once(':')?;
    let hours: f64 = hours.trim().parse().ok()?;
    let minutes: f64 = minutes.trim().parse().ok()?;
    Some(hours * 30.0 + minutes * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_to_degrees() {
        assert_eq!(clock_to_degrees("6:00"), Some(180.0));
        assert_eq!(clock_to_degrees("4:30"), Some(135.0));
        assert_eq!(clock_to_degrees("12:00"), Some(360.0));
        assert_eq!(clock_to_degrees("garbage"), None);
    }

    #[test]
    fn test_year_from_file_name() {
        assert_eq!(
            year_from_file_name(Path::new("2007 - Line 12.csv")),
            Some(2007)
        );
        assert_eq!(year_from_file_name(Path::new("notes.csv")), None);
    }

    #[test]
    fn test_csv_survey_parses_canonical_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2007 - Line 12.csv");
        std::fs::write(
            &path,
            "feature_id,distance,joint_number,relative_position,angle,feature_type,depth_percent,length,width,wall_thickness,elevation,j_len\n\
             ML-3,102.5,3,4.1,4:30,metal loss,24,1.5,0.8,0.312,810.2,39.6\n\
             ,205.0,7,,,cluster,0.4,,,,,\n",
        )
        .expect("write csv");

        let survey = load_survey_file(&path, 2007).expect("load csv");
        assert_eq!(survey.detections.len(), 2);
        let first = &survey.detections[0];
        assert_eq!(first.feature_id.as_deref(), Some("ML-3"));
        assert_eq!(first.angle, Some(135.0));
        // 24 % rescaled into a fraction
        assert_eq!(first.depth_percent, Some(0.24));
        assert_eq!(first.feature_type, FeatureType::MetalLoss);
        let second = &survey.detections[1];
        assert_eq!(second.feature_type, FeatureType::Cluster);
        assert_eq!(second.depth_percent, Some(0.4));
        assert_eq!(second.j_len, None);
    }

    #[test]
    fn test_csv_skips_malformed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2015 - Line 12.csv");
        std::fs::write(
            &path,
            "distance,feature_type\nnot-a-number,metal loss\n88.0,dent\n",
        )
        .expect("write csv");
        let survey = load_survey_file(&path, 2015).expect("load csv");
        assert_eq!(survey.detections.len(), 1);
        assert_eq!(survey.detections[0].feature_type, FeatureType::Dent);
    }

    #[test]
    fn test_missing_required_column_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("2015 - Line 12.csv");
        std::fs::write(&path, "distance,depth_percent\n1.0,0.2\n").expect("write csv");
        assert!(matches!(
            load_survey_file(&path, 2015),
            Err(LoaderError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_directory_load_sorts_by_year_and_skips_strays() {
        let dir = tempfile::tempdir().expect("tempdir");
        let detections = r#"[{"distance": 10.0, "feature_type": "metal-loss"}]"#;
        std::fs::write(dir.path().join("2022 - Line 9.json"), detections).expect("write");
        std::fs::write(dir.path().join("2007 - Line 9.json"), detections).expect("write");
        std::fs::write(dir.path().join("readme.txt"), "not a survey").expect("write");
        std::fs::write(dir.path().join("master.json"), "[]").expect("write");

        let surveys = load_survey_dir(dir.path()).expect("load dir");
        let years: Vec<i32> = surveys.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2007, 2022]);
        assert_eq!(surveys[0].detections.len(), 1);
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            load_survey_dir(dir.path()),
            Err(LoaderError::NoSurveys(_))
        ));
    }
}
