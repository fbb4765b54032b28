use crate::config::{IncomeSourceKind, PipelineConfig};
use crate::manifest::{write_publish_manifest, PublishManifest, TableRecord};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use respub_core::diagnostics::PUBLISH;
use respub_core::{
    publish_baseline, publish_upgrade, FailedBuildingSet, IncomeSource, PublishContext,
    PublishedTable,
};
use respub_io::{
    discover_result_files, load_catalog, load_geo_lookups, load_income_lookup, read_frame,
    write_published, UpgradeFile,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// One `process` run: raw results in, published tables out.
pub struct ProcessConfig {
    pub raw_results_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

/// Summary returned after the run so callers can report counts and the
/// manifest location.
pub struct ProcessSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub baseline: TableRecord,
    pub upgrades: Vec<TableRecord>,
}

/// Load the catalog and lookups once for the whole run.
pub fn build_context(pipeline: &PipelineConfig) -> Result<PublishContext> {
    let assets = &pipeline.assets;
    let catalog = load_catalog(&assets.column_definitions)?;
    let geo = load_geo_lookups(&assets.county_lookup, &assets.puma_lookup)?;
    let income = match pipeline.run.income_source {
        IncomeSourceKind::BinMidpoint => IncomeSource::BinMidpoint,
        IncomeSourceKind::Lookup => {
            let dir = assets.income_maps_dir.as_deref().ok_or_else(|| {
                anyhow!("income_source = \"lookup\" requires assets.income_maps_dir")
            })?;
            IncomeSource::Lookup(load_income_lookup(dir)?)
        }
    };
    Ok(PublishContext::new(catalog, geo, income))
}

/// Publish the baseline, then every upgrade against it.
///
/// A baseline failure aborts the run. Upgrades run on a Rayon pool once the
/// baseline is materialized; an upgrade that fails is recorded in the
/// manifest and the others carry on.
pub fn process_results(config: &ProcessConfig) -> Result<ProcessSummary> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "creating output directory '{}'",
            config.output_dir.display()
        )
    })?;

    let files = discover_result_files(&config.raw_results_dir)?;
    let ctx = build_context(&config.pipeline)?;

    info!(file = %files.baseline.display(), "processing baseline file");
    let raw = read_frame(&files.baseline)?;
    let baseline = publish_baseline(raw, &ctx)?;
    info!(
        count = baseline.failed.len(),
        "removed buildings that failed in baseline"
    );
    let mut baseline_frame = baseline.table.frame.clone();
    let outputs = write_published(&config.output_dir, 0, &mut baseline_frame)?;
    let baseline_record = TableRecord {
        upgrade: 0,
        upgrade_name: baseline.table.record.upgrade_name.clone(),
        source_file: files.baseline.display().to_string(),
        status: "ok".to_string(),
        error: None,
        rows: baseline.table.frame.height(),
        backfilled_ids: Vec::new(),
        upgrade_only_failures: Vec::new(),
        outputs: Some(outputs),
        diagnostics: baseline.table.diagnostics.clone(),
    };

    let thread_count = if config.pipeline.run.threads == 0 {
        num_cpus::get()
    } else {
        config.pipeline.run.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for upgrade publication")?;

    // par_iter + collect keeps upgrade-number order.
    let upgrades: Vec<TableRecord> = pool.install(|| {
        files
            .upgrades
            .par_iter()
            .map(|file| {
                run_upgrade(
                    file,
                    &baseline.table,
                    &baseline.failed,
                    &ctx,
                    &config.output_dir,
                )
            })
            .collect()
    });

    let success = upgrades.iter().filter(|record| record.is_ok()).count();
    let failure = upgrades.len() - success;

    let manifest = PublishManifest {
        created_at: Utc::now(),
        raw_results_dir: config.raw_results_dir.display().to_string(),
        baseline_file: files.baseline.display().to_string(),
        failed_baseline_buildings: baseline.failed.len(),
        success,
        failure,
        baseline: baseline_record.clone(),
        upgrades: upgrades.clone(),
    };
    let manifest_path = config.output_dir.join(&config.pipeline.run.manifest_name);
    write_publish_manifest(&manifest_path, &manifest)?;

    Ok(ProcessSummary {
        success,
        failure,
        manifest_path,
        baseline: baseline_record,
        upgrades,
    })
}

/// Publish and write a single upgrade. Errors become the record's status.
fn run_upgrade(
    file: &UpgradeFile,
    baseline: &PublishedTable,
    failed: &FailedBuildingSet,
    ctx: &PublishContext,
    output_dir: &Path,
) -> TableRecord {
    info!(
        file = %file.path.display(),
        upgrade = file.upgrade,
        "processing upgrade file"
    );
    let mut record = TableRecord {
        upgrade: file.upgrade,
        upgrade_name: None,
        source_file: file.path.display().to_string(),
        status: "ok".to_string(),
        error: None,
        rows: 0,
        backfilled_ids: Vec::new(),
        upgrade_only_failures: Vec::new(),
        outputs: None,
        diagnostics: Default::default(),
    };

    let mut runner = || -> Result<()> {
        let raw = read_frame(&file.path)?;
        let published = publish_upgrade(raw, baseline, failed, file.upgrade, ctx)
            .with_context(|| format!("publishing upgrade {}", file.upgrade))?;
        let mut frame = published.table.frame;
        record.outputs = Some(write_published(output_dir, file.upgrade, &mut frame)?);
        record.upgrade_name = published.table.record.upgrade_name;
        record.rows = frame.height();
        record.backfilled_ids = published.backfilled_ids;
        record.upgrade_only_failures = published.upgrade_only_failures;
        record.diagnostics = published.table.diagnostics;
        Ok(())
    };
    if let Err(err) = runner() {
        error!(upgrade = file.upgrade, "upgrade publication failed: {err:#}");
        let message = format!("{err:#}");
        record.diagnostics.add_error(PUBLISH, &message);
        record.status = "error".to_string();
        record.error = Some(message);
    }
    if record.diagnostics.has_issues() {
        info!(
            upgrade = file.upgrade,
            "upgrade diagnostics: {}",
            record.diagnostics.summary()
        );
    }
    record
}
