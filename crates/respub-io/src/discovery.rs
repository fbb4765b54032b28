//! Locating the baseline and upgrade result files in a raw results tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use respub_core::RespubError;
use tracing::warn;
use walkdir::WalkDir;

use crate::frames::TableFormat;

static UPGRADE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"up(\d{2,})").expect("valid upgrade number regex"));

const BASELINE_MARKER: &str = "up00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeFile {
    pub upgrade: u32,
    pub path: PathBuf,
}

/// One baseline file and the upgrade files, sorted by upgrade number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFiles {
    pub baseline: PathBuf,
    pub upgrades: Vec<UpgradeFile>,
}

/// Upgrade number encoded in a file name (`results_up07.parquet` -> 7).
pub fn upgrade_number(file_name: &str) -> Option<u32> {
    let caps = UPGRADE_NUMBER.captures(file_name)?;
    caps[1].parse().ok()
}

/// Walk `raw_results_dir` for result tables. Exactly one file must carry
/// the `up00` marker and each upgrade number may appear once; anything else
/// without an upgrade number is skipped.
pub fn discover_result_files(raw_results_dir: &Path) -> Result<ResultFiles> {
    if !raw_results_dir.is_dir() {
        return Err(RespubError::Discovery(format!(
            "raw results directory '{}' does not exist",
            raw_results_dir.display()
        ))
        .into());
    }

    let mut baselines = Vec::new();
    let mut upgrades: BTreeMap<u32, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(raw_results_dir).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("walking '{}'", raw_results_dir.display()))?;
        if !entry.file_type().is_file() || TableFormat::from_path(entry.path()).is_none() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.contains(BASELINE_MARKER) {
            baselines.push(entry.into_path());
            continue;
        }
        match upgrade_number(&name) {
            Some(upgrade) => {
                if let Some(first) = upgrades.get(&upgrade) {
                    return Err(RespubError::Discovery(format!(
                        "upgrade {upgrade} has more than one results file: {}, {}",
                        first.display(),
                        entry.path().display()
                    ))
                    .into());
                }
                upgrades.insert(upgrade, entry.into_path());
            }
            None => warn!(
                file = %entry.path().display(),
                "skipping results file without an upgrade number"
            ),
        }
    }

    let baseline = match baselines.len() {
        0 => {
            return Err(RespubError::Discovery(format!(
                "no baseline ({BASELINE_MARKER}) results file found under '{}'",
                raw_results_dir.display()
            ))
            .into())
        }
        1 => baselines.remove(0),
        n => {
            let listed: Vec<String> = baselines.iter().map(|p| p.display().to_string()).collect();
            return Err(RespubError::Discovery(format!(
                "{n} baseline results files found, expected one: {}",
                listed.join(", ")
            ))
            .into());
        }
    };
    let upgrades = upgrades
        .into_iter()
        .map(|(upgrade, path)| UpgradeFile { upgrade, path })
        .collect();

    Ok(ResultFiles { baseline, upgrades })
}
