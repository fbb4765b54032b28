//! Standalone failure checker for raw results CSV files.
//!
//! Never fails: problems reading the file become a single synthetic
//! record with `building_id = "N/A"`, so the report still says why the
//! file could not be analysed.

use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use respub_core::columns::{BUILDING_ID, COMPLETED_STATUS, STATUS_FAIL};
use respub_core::frame::{column_utf8, has_column};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const STEP_FAILURES: &str = "step_failures";
const EPLUSOUT_ERR: &str = "eplusout_err";
const NOT_AVAILABLE: &str = "N/A";
pub const NO_STEP_FAILURES: &str = "Step failure details not available";
pub const NO_EPLUSOUT_ERR: &str = "eplusout_err not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub building_id: String,
    pub completed_status: String,
    pub step_failures: String,
    pub eplusout_err: String,
}

impl FailureRecord {
    fn synthetic(message: String) -> Self {
        Self {
            building_id: NOT_AVAILABLE.to_string(),
            completed_status: NOT_AVAILABLE.to_string(),
            step_failures: message,
            eplusout_err: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Failed simulations in a raw results CSV.
pub fn get_failures(csv_path: &Path, verbose: bool) -> Vec<FailureRecord> {
    if !csv_path.exists() {
        warn!(path = %csv_path.display(), "results file does not exist");
        return vec![FailureRecord::synthetic(format!(
            "Path {} does not exist.",
            csv_path.display()
        ))];
    }
    if verbose {
        info!(path = %csv_path.display(), "checking results file");
    }
    match read_failures(csv_path) {
        Ok(failures) => failures,
        Err(err) => {
            warn!(path = %csv_path.display(), "could not analyse results file: {err:#}");
            vec![FailureRecord::synthetic(format!(
                "Error processing {}: {err:#}",
                csv_path.display()
            ))]
        }
    }
}

fn read_failures(csv_path: &Path) -> Result<Vec<FailureRecord>> {
    let mut file = File::open(csv_path)
        .with_context(|| format!("opening '{}'", csv_path.display()))?;
    let df = CsvReader::new(&mut file)
        .has_header(true)
        .infer_schema(Some(0))
        .finish()
        .context("reading CSV")?;

    if !has_column(&df, COMPLETED_STATUS) {
        warn!(path = %csv_path.display(), "'{COMPLETED_STATUS}' column not found");
        return Ok(vec![FailureRecord::synthetic(format!(
            "{COMPLETED_STATUS} column not found in {}",
            csv_path.display()
        ))]);
    }

    let statuses = column_utf8(&df, COMPLETED_STATUS)?;
    let optional = |column: &str| -> Result<Vec<Option<String>>> {
        if has_column(&df, column) {
            Ok(column_utf8(&df, column)?)
        } else {
            Ok(vec![None; df.height()])
        }
    };
    let ids = optional(BUILDING_ID)?;
    let steps = if has_column(&df, STEP_FAILURES) {
        optional(STEP_FAILURES)?
    } else {
        vec![Some(NO_STEP_FAILURES.to_string()); df.height()]
    };
    let errs = if has_column(&df, EPLUSOUT_ERR) {
        optional(EPLUSOUT_ERR)?
    } else {
        vec![Some(NO_EPLUSOUT_ERR.to_string()); df.height()]
    };

    Ok(statuses
        .into_iter()
        .enumerate()
        .filter(|(_, status)| status.as_deref() == Some(STATUS_FAIL))
        .map(|(row, status)| FailureRecord {
            building_id: ids[row].clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            completed_status: status.unwrap_or_default(),
            step_failures: steps[row].clone().unwrap_or_default(),
            eplusout_err: errs[row].clone().unwrap_or_default(),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct StepFailure {
    #[serde(default)]
    measure_dir_name: Option<String>,
    #[serde(default)]
    step_errors: Vec<String>,
}

/// Parse a `step_failures` cell holding a JSON list of measure failures.
/// Single-quoted literal lists are accepted too.
fn parse_step_failures(raw: &str) -> Option<Vec<StepFailure>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    serde_json::from_str(trimmed)
        .ok()
        .or_else(|| serde_json::from_str(&trimmed.replace('\'', "\"")).ok())
}

/// Human-readable failure report.
pub fn render_failures(failures: &[FailureRecord], csv_path: &Path) -> String {
    let mut out = String::new();
    if failures.is_empty() {
        return out;
    }
    let _ = writeln!(
        out,
        "Found {} failures in {}:",
        failures.len(),
        csv_path.display()
    );
    for (index, failure) in failures.iter().enumerate() {
        let _ = writeln!(out, "  {}. Building ID: {}", index + 1, failure.building_id);
        match parse_step_failures(&failure.step_failures) {
            Some(steps) => {
                let _ = writeln!(out, "     Step Failures:");
                for step in steps {
                    let measure = step.measure_dir_name.as_deref().unwrap_or("Unknown");
                    let _ = writeln!(out, "       - Measure: {measure}");
                    if step.step_errors.is_empty() {
                        let _ = writeln!(out, "         No specific error details available");
                        continue;
                    }
                    let _ = writeln!(out, "         Errors:");
                    for (error_index, error) in step.step_errors.iter().enumerate() {
                        let mut lines = error.split('\n');
                        let first = lines.next().unwrap_or_default();
                        let _ = writeln!(out, "           {}. {first}", error_index + 1);
                        for line in lines {
                            let _ = writeln!(out, "              {line}");
                        }
                    }
                }
            }
            None => {
                let _ = writeln!(out, "     Step Failures: {}", failure.step_failures);
            }
        }
        let _ = writeln!(out, "     eplusout_err: {}", failure.eplusout_err);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_path_yields_synthetic_record() {
        let failures = get_failures(Path::new("/nonexistent/results_up00.csv"), false);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].building_id, "N/A");
        assert!(failures[0].step_failures.starts_with("Path "));
    }

    #[test]
    fn reports_failed_rows_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results_up00.csv");
        fs::write(
            &path,
            "building_id,completed_status\n1,Success\n2,Fail\n3,Fail\n",
        )
        .unwrap();
        let failures = get_failures(&path, true);
        let ids: Vec<&str> = failures.iter().map(|f| f.building_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(failures[0].step_failures, NO_STEP_FAILURES);
        assert_eq!(failures[0].eplusout_err, NO_EPLUSOUT_ERR);
    }

    #[test]
    fn missing_status_column_yields_synthetic_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results_up00.csv");
        fs::write(&path, "building_id\n1\n").unwrap();
        let failures = get_failures(&path, false);
        assert_eq!(failures.len(), 1);
        assert!(failures[0]
            .step_failures
            .contains("completed_status column not found"));
    }

    #[test]
    fn renders_structured_step_failures() {
        let failure = FailureRecord {
            building_id: "7".to_string(),
            completed_status: "Fail".to_string(),
            step_failures: r#"[{"measure_dir_name": "ApplyUpgrade", "step_errors": ["boom\nat line 3"]}, {"measure_dir_name": "Other"}]"#.to_string(),
            eplusout_err: "none".to_string(),
        };
        let report = render_failures(&[failure], Path::new("results.csv"));
        assert!(report.starts_with("Found 1 failures in results.csv:"));
        assert!(report.contains("       - Measure: ApplyUpgrade"));
        assert!(report.contains("           1. boom\n              at line 3"));
        assert!(report.contains("No specific error details available"));
        assert!(report.contains("     eplusout_err: none"));
    }

    #[test]
    fn renders_plain_step_failures_verbatim() {
        let failure = FailureRecord::synthetic("Path x does not exist.".to_string());
        let report = render_failures(&[failure], Path::new("x"));
        assert!(report.contains("     Step Failures: Path x does not exist."));
        assert!(render_failures(&[], Path::new("x")).is_empty());
    }
}
