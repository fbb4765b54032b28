//! Column catalog: the static table that maps raw batch columns onto
//! published column names, types and unit conversions.
//!
//! The catalog is loaded once per run (see `respub_io::lookups`) and passed
//! by reference into every stage that needs it. Declaration order matters:
//! it is the column order of every published table.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{RespubError, RespubResult};

/// Role of a catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Input,
    Output,
    /// Derived or bookkeeping columns that are not copied from raw data.
    Other(String),
}

impl ColumnType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Input" => ColumnType::Input,
            "Output" => ColumnType::Output,
            other => ColumnType::Other(other.to_string()),
        }
    }

    /// Input and Output rows are copied from raw data by the transformer.
    pub fn is_transformable(&self) -> bool {
        matches!(self, ColumnType::Input | ColumnType::Output)
    }
}

/// One row of the column-definition table, exactly as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "Column Type", default)]
    pub column_type: Option<String>,
    #[serde(rename = "Annual Name", default)]
    pub annual_name: Option<String>,
    #[serde(rename = "Published Annual Name", default)]
    pub published_annual_name: Option<String>,
    #[serde(
        rename = "ResStock To Published Annual Unit Conversion Factor",
        default
    )]
    pub conversion_factor: Option<String>,
}

/// Validated catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapEntry {
    pub column_type: ColumnType,
    pub source_name: Option<String>,
    pub published_name: String,
    pub conversion_factor: Option<f64>,
}

impl ColumnMapEntry {
    pub fn input(source: &str, published: &str) -> Self {
        Self {
            column_type: ColumnType::Input,
            source_name: Some(source.to_string()),
            published_name: published.to_string(),
            conversion_factor: None,
        }
    }

    pub fn output(source: &str, published: &str, conversion_factor: Option<f64>) -> Self {
        Self {
            column_type: ColumnType::Output,
            source_name: Some(source.to_string()),
            published_name: published.to_string(),
            conversion_factor,
        }
    }

    pub fn derived(published: &str) -> Self {
        Self {
            column_type: ColumnType::Other("Calculated".to_string()),
            source_name: None,
            published_name: published.to_string(),
            conversion_factor: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnCatalog {
    entries: Vec<ColumnMapEntry>,
}

impl ColumnCatalog {
    /// Build a catalog from already-typed entries, enforcing that every
    /// Input/Output entry names its source column.
    pub fn new(entries: Vec<ColumnMapEntry>) -> RespubResult<Self> {
        for entry in &entries {
            if entry.column_type.is_transformable() && entry.source_name.is_none() {
                return Err(RespubError::Config(format!(
                    "column '{}' is {:?} but has no Annual Name",
                    entry.published_name, entry.column_type
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Build a catalog from raw definition rows. Rows without a published
    /// name are not part of the publication and are ignored.
    pub fn from_records<I>(records: I) -> RespubResult<Self>
    where
        I: IntoIterator<Item = CatalogRecord>,
    {
        let mut entries = Vec::new();
        for record in records {
            let Some(published_name) = non_empty(record.published_annual_name) else {
                continue;
            };
            let column_type = ColumnType::parse(record.column_type.as_deref().unwrap_or(""));
            let conversion_factor = match non_empty(record.conversion_factor) {
                Some(raw) => Some(raw.trim().parse::<f64>().map_err(|_| {
                    RespubError::Config(format!(
                        "conversion factor '{raw}' for '{published_name}' is not numeric"
                    ))
                })?),
                None => None,
            };
            entries.push(ColumnMapEntry {
                column_type,
                source_name: non_empty(record.annual_name),
                published_name,
                conversion_factor,
            });
        }
        Self::new(entries)
    }

    pub fn entries(&self) -> &[ColumnMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Published names in declaration order, first occurrence only.
    pub fn published_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|entry| entry.published_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Entries the transformer copies from raw data.
    pub fn transformable(&self) -> impl Iterator<Item = &ColumnMapEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.column_type.is_transformable())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
