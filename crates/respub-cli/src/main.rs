use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use respub_batch::{process_results, PipelineConfig, ProcessConfig};
use respub_cli::{Cli, Commands};
use respub_io::{get_failures, render_failures};
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn run_process(
    raw_results_dir: &Path,
    output_dir: &Path,
    config: Option<&Path>,
    threads: Option<usize>,
) -> Result<ExitCode> {
    let mut pipeline = PipelineConfig::load(config)?;
    if let Some(threads) = threads {
        pipeline.run.threads = threads;
    }
    let summary = process_results(&ProcessConfig {
        raw_results_dir: raw_results_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        pipeline,
    })?;

    println!(
        "Published baseline ({} rows) and {} upgrade(s) to {}",
        summary.baseline.rows,
        summary.success,
        output_dir.display()
    );
    for record in summary.upgrades.iter().filter(|record| !record.is_ok()) {
        println!(
            "  upgrade {} failed: {}",
            record.upgrade,
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("Manifest: {}", summary.manifest_path.display());

    if summary.failure > 0 {
        warn!(failed = summary.failure, "some upgrades were not published");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_failures(csv_file: &Path, verbose: bool, exit_code: bool) -> ExitCode {
    let failures = get_failures(csv_file, verbose);
    print!("{}", render_failures(&failures, csv_file));

    if exit_code && !failures.is_empty() {
        println!(
            "ERROR: {} simulation(s) failed. Check the logs above for details.",
            failures.len()
        );
        return ExitCode::FAILURE;
    }
    if failures.is_empty() {
        println!("All simulations completed successfully.");
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match &cli.command {
        Commands::Process {
            raw_results_dir,
            output_dir,
            config,
            threads,
        } => {
            info!(
                "Publishing results from {} to {}",
                raw_results_dir.display(),
                output_dir.display()
            );
            match run_process(raw_results_dir, output_dir, config.as_deref(), *threads) {
                Ok(code) => code,
                Err(e) => {
                    error!("Processing failed: {e:?}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Failures {
            csv_file,
            verbose,
            exit_code,
        } => run_failures(csv_file, *verbose, *exit_code),
    }
}
