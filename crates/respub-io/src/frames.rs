//! Reading raw result tables and writing published ones.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Rows sampled for CSV schema inference. Raw results have thousands of
/// sparse columns, so the polars default is too small.
const CSV_INFER_ROWS: usize = 10_000;

/// Input formats recognised in a raw results directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    CsvGz,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".csv.gz") {
            Some(TableFormat::CsvGz)
        } else if name.ends_with(".csv") {
            Some(TableFormat::Csv)
        } else if name.ends_with(".parquet") {
            Some(TableFormat::Parquet)
        } else {
            None
        }
    }
}

/// Load a raw results table from CSV, gzipped CSV or Parquet.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let format = TableFormat::from_path(path).ok_or_else(|| {
        anyhow!(
            "unsupported results file '{}' (use .csv, .csv.gz or .parquet)",
            path.display()
        )
    })?;
    let mut file =
        File::open(path).with_context(|| format!("opening results file '{}'", path.display()))?;
    match format {
        TableFormat::Parquet => ParquetReader::new(&mut file)
            .finish()
            .with_context(|| format!("reading Parquet results '{}'", path.display())),
        TableFormat::Csv | TableFormat::CsvGz => CsvReader::new(&mut file)
            .has_header(true)
            .infer_schema(Some(CSV_INFER_ROWS))
            .finish()
            .with_context(|| format!("reading CSV results '{}'", path.display())),
    }
}

/// Where a published table was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedPaths {
    pub csv: PathBuf,
    pub parquet: PathBuf,
}

pub fn published_paths(output_dir: &Path, upgrade: u32) -> PublishedPaths {
    let file_stem = format!("results_up{upgrade:02}");
    PublishedPaths {
        csv: output_dir
            .join("results_csvs_pub")
            .join(format!("{file_stem}.csv")),
        parquet: output_dir
            .join("parquet")
            .join(format!("upgrade={upgrade}"))
            .join(format!("{file_stem}.parquet")),
    }
}

/// Write one published table as CSV and Parquet under `output_dir`.
pub fn write_published(output_dir: &Path, upgrade: u32, df: &mut DataFrame) -> Result<PublishedPaths> {
    let paths = published_paths(output_dir, upgrade);
    for path in [&paths.csv, &paths.parquet] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory '{}'", parent.display()))?;
        }
    }

    let mut file = File::create(&paths.parquet)
        .with_context(|| format!("creating Parquet output '{}'", paths.parquet.display()))?;
    ParquetWriter::new(&mut file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)
        .with_context(|| format!("writing Parquet {}", paths.parquet.display()))?;

    let mut file = File::create(&paths.csv)
        .with_context(|| format!("creating CSV output '{}'", paths.csv.display()))?;
    CsvWriter::new(&mut file)
        .finish(df)
        .with_context(|| format!("writing CSV {}", paths.csv.display()))?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recognises_formats_by_name() {
        assert_eq!(
            TableFormat::from_path(Path::new("results_up00.csv.gz")),
            Some(TableFormat::CsvGz)
        );
        assert_eq!(
            TableFormat::from_path(Path::new("RESULTS_UP01.PARQUET")),
            Some(TableFormat::Parquet)
        );
        assert_eq!(TableFormat::from_path(Path::new("notes.txt")), None);
    }

    #[test]
    fn published_paths_pad_file_names_only() {
        let paths = published_paths(Path::new("/out"), 3);
        assert_eq!(paths.csv, PathBuf::from("/out/results_csvs_pub/results_up03.csv"));
        assert_eq!(
            paths.parquet,
            PathBuf::from("/out/parquet/upgrade=3/results_up03.parquet")
        );
    }

    #[test]
    fn written_tables_read_back() {
        let dir = tempdir().unwrap();
        let mut df = df![
            "bldg_id" => &[1i64, 2],
            "out.electricity.total.energy_consumption" => &[1.5f64, 2.5],
        ]
        .unwrap();
        let paths = write_published(dir.path(), 0, &mut df).unwrap();

        let csv = read_frame(&paths.csv).unwrap();
        assert_eq!(csv.shape(), (2, 2));
        let parquet = read_frame(&paths.parquet).unwrap();
        assert_eq!(parquet.shape(), (2, 2));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = read_frame(Path::new("results_up00.json")).unwrap_err();
        assert!(err.to_string().contains("unsupported results file"));
    }
}
