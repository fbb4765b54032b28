use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert raw baseline and upgrade results into the published dataset
    Process {
        /// Directory holding results_up00 and results_upNN files (searched recursively)
        #[arg(value_hint = ValueHint::DirPath)]
        raw_results_dir: PathBuf,
        /// Directory for results_csvs_pub/, parquet/ and the run manifest
        #[arg(value_hint = ValueHint::DirPath)]
        output_dir: PathBuf,
        /// Pipeline config (TOML); built-in defaults when omitted
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Worker threads for upgrades (0 = one per CPU); overrides the config
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Check a raw results CSV for failed simulations
    Failures {
        /// Results CSV to inspect
        #[arg(value_hint = ValueHint::FilePath)]
        csv_file: PathBuf,
        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Exit with a non-zero code if failures are found
        #[arg(short, long)]
        exit_code: bool,
    },
}
