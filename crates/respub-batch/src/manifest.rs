use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use respub_core::Diagnostics;
use respub_io::PublishedPaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::Path;

/// Outcome of publishing one table (baseline or upgrade).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRecord {
    pub upgrade: u32,
    pub upgrade_name: Option<String>,
    pub source_file: String,
    /// `ok` or `error`
    pub status: String,
    pub error: Option<String>,
    pub rows: usize,
    #[serde(default)]
    pub backfilled_ids: Vec<i64>,
    #[serde(default)]
    pub upgrade_only_failures: Vec<i64>,
    pub outputs: Option<PublishedPaths>,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl TableRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishManifest {
    pub created_at: DateTime<Utc>,
    pub raw_results_dir: String,
    pub baseline_file: String,
    pub failed_baseline_buildings: usize,
    pub success: usize,
    pub failure: usize,
    pub baseline: TableRecord,
    pub upgrades: Vec<TableRecord>,
}

pub fn write_publish_manifest(path: &Path, manifest: &PublishManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing publish manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing publish manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_publish_manifest(path: &Path) -> Result<PublishManifest> {
    let file = File::open(path)
        .with_context(|| format!("opening publish manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing publish manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn record(upgrade: u32, status: &str) -> TableRecord {
        TableRecord {
            upgrade,
            upgrade_name: Some("Heat pump".into()),
            source_file: format!("raw/results_up{upgrade:02}.parquet"),
            status: status.into(),
            error: None,
            rows: 3,
            backfilled_ids: vec![7],
            upgrade_only_failures: vec![7],
            outputs: None,
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn manifest_writes_and_reads_back() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_warning_with_column("schema", "declared column missing", "in.puma");
        let mut baseline = record(0, "ok");
        baseline.diagnostics = diagnostics;
        let manifest = PublishManifest {
            created_at: Utc::now(),
            raw_results_dir: "raw".into(),
            baseline_file: "raw/results_up00.parquet".into(),
            failed_baseline_buildings: 2,
            success: 1,
            failure: 1,
            baseline,
            upgrades: vec![record(1, "error")],
        };
        let tmp = NamedTempFile::new().unwrap();
        write_publish_manifest(tmp.path(), &manifest).unwrap();

        let parsed = load_publish_manifest(tmp.path()).unwrap();
        assert_eq!(parsed.failed_baseline_buildings, 2);
        assert_eq!(parsed.baseline.diagnostics.warning_count(), 1);
        assert!(!parsed.upgrades[0].is_ok());
        assert_eq!(parsed.upgrades[0].backfilled_ids, vec![7]);
    }
}
