//! Schema validation and column reordering against the catalog.

use std::collections::HashSet;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::catalog::ColumnCatalog;
use crate::columns::is_upgrade_detail;
use crate::diagnostics::{self, Diagnostics};
use crate::frame::column_names;

/// Outcome of comparing a table's columns with the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Present in the data, not declared, and dropped.
    pub extra: Vec<String>,
    /// Declared but absent from the data.
    pub missing: Vec<String>,
}

impl SchemaReport {
    pub fn is_conformant(&self) -> bool {
        self.extra.is_empty() && self.missing.is_empty()
    }
}

fn expected_absent_in_baseline(column: &str) -> bool {
    column.contains("savings") || column.contains("reduction")
}

/// Compare `columns` with the catalog's published names.
pub fn validate_columns(columns: &[String], catalog: &ColumnCatalog, is_baseline: bool) -> SchemaReport {
    let present: HashSet<&str> = columns.iter().map(String::as_str).collect();
    let declared = catalog.published_names();
    let declared_set: HashSet<&str> = declared.iter().copied().collect();

    let extra = columns
        .iter()
        .filter(|name| !declared_set.contains(name.as_str()) && !is_upgrade_detail(name))
        .cloned()
        .collect();
    let missing = declared
        .iter()
        .filter(|name| !present.contains(*name))
        .filter(|name| !is_upgrade_detail(name))
        .filter(|name| !(is_baseline && expected_absent_in_baseline(name)))
        .map(|name| name.to_string())
        .collect();

    SchemaReport { extra, missing }
}

/// Restrict `df` to declared-and-present columns in catalog order, followed
/// by any `upgrade.*` detail columns in their current order.
///
/// Drift is reported through the returned diagnostics and the log; this
/// never fails.
pub fn reorder_columns(
    df: DataFrame,
    catalog: &ColumnCatalog,
    is_baseline: bool,
) -> (DataFrame, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let columns = column_names(&df);
    let report = validate_columns(&columns, catalog, is_baseline);
    if report.is_conformant() {
        debug!(columns = columns.len(), "output columns match the column definitions");
    }

    if !report.extra.is_empty() {
        warn!(
            columns = ?report.extra,
            "extra columns in output data not defined in the column definitions"
        );
    }
    for column in &report.extra {
        diagnostics.add_warning_with_column(
            diagnostics::SCHEMA,
            "column not declared in the column definitions; dropped",
            column,
        );
    }
    if !report.missing.is_empty() {
        warn!(
            columns = ?report.missing,
            "columns defined in the column definitions are missing from output data"
        );
    }
    for column in &report.missing {
        diagnostics.add_warning_with_column(
            diagnostics::SCHEMA,
            "declared column missing from output data",
            column,
        );
    }

    let present: HashSet<&str> = columns.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<Series> = Vec::new();
    for name in catalog.published_names() {
        if present.contains(name) && seen.insert(name) {
            if let Ok(series) = df.column(name) {
                ordered.push(series.clone());
            }
        }
    }
    for name in columns.iter().filter(|name| is_upgrade_detail(name)) {
        if seen.insert(name.as_str()) {
            if let Ok(series) = df.column(name) {
                ordered.push(series.clone());
            }
        }
    }

    (DataFrame::new_no_checks(ordered), diagnostics)
}
