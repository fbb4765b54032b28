pub mod config;
pub mod manifest;
pub mod runner;

pub use config::{AssetsConfig, IncomeSourceKind, PipelineConfig, RunConfig};
pub use manifest::{load_publish_manifest, write_publish_manifest, PublishManifest, TableRecord};
pub use runner::{build_context, process_results, ProcessConfig, ProcessSummary};
