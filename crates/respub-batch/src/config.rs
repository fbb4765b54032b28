//! Pipeline configuration loaded from an optional TOML file.
//!
//! ```toml
//! [assets]
//! column_definitions = "resources/publication_column_definitions.csv"
//! county_lookup = "resources/gisdata/county_lookup_table.csv"
//! puma_lookup = "resources/gisdata/puma_lookup_table.csv"
//! income_maps_dir = "resources/income_maps"
//!
//! [run]
//! threads = 0
//! income_source = "lookup"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Static lookup assets. Relative paths in a config file resolve against
/// the file's directory; defaults resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_column_definitions")]
    pub column_definitions: PathBuf,
    #[serde(default = "default_county_lookup")]
    pub county_lookup: PathBuf,
    #[serde(default = "default_puma_lookup")]
    pub puma_lookup: PathBuf,
    /// Directory of income-bin parquet tables; needed for `income_source = "lookup"`
    #[serde(default)]
    pub income_maps_dir: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            column_definitions: default_column_definitions(),
            county_lookup: default_county_lookup(),
            puma_lookup: default_puma_lookup(),
            income_maps_dir: None,
        }
    }
}

fn default_column_definitions() -> PathBuf {
    PathBuf::from("resources/publication_column_definitions.csv")
}

fn default_county_lookup() -> PathBuf {
    PathBuf::from("resources/gisdata/county_lookup_table.csv")
}

fn default_puma_lookup() -> PathBuf {
    PathBuf::from("resources/gisdata/puma_lookup_table.csv")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeSourceKind {
    /// Midpoint of the `in.income` bin label
    #[default]
    BinMidpoint,
    /// Hierarchical join against the income-bin tables
    Lookup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Worker threads for upgrade publication (0 = one per CPU)
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub income_source: IncomeSourceKind,
    /// Manifest file name inside the output directory
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            income_source: IncomeSourceKind::default(),
            manifest_name: default_manifest_name(),
        }
    }
}

fn default_manifest_name() -> String {
    "publish_manifest.json".to_string()
}

impl PipelineConfig {
    /// Parse a config file, resolving relative asset paths against its
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let mut config: PipelineConfig = toml::from_str(&contents)
            .with_context(|| format!("parsing config '{}'", path.display()))?;
        if let Some(base) = path.parent() {
            config.assets.resolve_against(base);
        }
        Ok(config)
    }

    /// Defaults when no config file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

impl AssetsConfig {
    fn resolve_against(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.column_definitions);
        resolve(&mut self.county_lookup);
        resolve(&mut self.puma_lookup);
        if let Some(dir) = self.income_maps_dir.as_mut() {
            resolve(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let config = PipelineConfig::load(None).unwrap();
        assert_eq!(config.run.threads, 0);
        assert_eq!(config.run.income_source, IncomeSourceKind::BinMidpoint);
        assert_eq!(config.run.manifest_name, "publish_manifest.json");
        assert!(config.assets.column_definitions.starts_with("resources"));
    }

    #[test]
    fn partial_file_keeps_defaults_and_resolves_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("respub.toml");
        fs::write(
            &path,
            "[assets]\ncounty_lookup = \"geo/county.csv\"\nincome_maps_dir = \"/abs/income\"\n\n[run]\nincome_source = \"lookup\"\nthreads = 4\n",
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.assets.county_lookup, dir.path().join("geo/county.csv"));
        assert_eq!(
            config.assets.column_definitions,
            dir.path().join("resources/publication_column_definitions.csv")
        );
        assert_eq!(config.assets.income_maps_dir, Some(PathBuf::from("/abs/income")));
        assert_eq!(config.run.income_source, IncomeSourceKind::Lookup);
        assert_eq!(config.run.threads, 4);
    }

    #[test]
    fn unknown_income_source_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("respub.toml");
        fs::write(&path, "[run]\nincome_source = \"census\"\n").unwrap();
        assert!(PipelineConfig::from_file(&path).is_err());
    }
}
