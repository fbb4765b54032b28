//! Catalog-driven projection of a raw result table into published column
//! space.

use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use crate::catalog::ColumnCatalog;
use crate::columns::{is_upgrade_cost_name, BLDG_ID};
use crate::diagnostics::{self, Diagnostics};
use crate::error::RespubResult;
use crate::frame::schema_names;

/// Rename, convert and select the catalog's Input/Output columns.
///
/// Entries whose source column is absent are skipped; the gap surfaces again
/// at schema validation. Raw `upgrade_costs.*_name` columns ride along
/// unchanged for the upgrade-detail expansion.
pub fn transform_columns(
    lf: LazyFrame,
    catalog: &ColumnCatalog,
    diagnostics: &mut Diagnostics,
) -> RespubResult<LazyFrame> {
    let present: HashSet<String> = schema_names(&lf)?.into_iter().collect();
    let mut produced: HashSet<&str> = HashSet::new();
    let mut exprs = Vec::new();
    let mut skipped = 0usize;

    for entry in catalog.transformable() {
        let Some(source) = entry.source_name.as_deref() else {
            continue;
        };
        if !present.contains(source) {
            debug!(
                source,
                published = entry.published_name.as_str(),
                "catalog source column absent from raw table"
            );
            skipped += 1;
            continue;
        }
        if !produced.insert(entry.published_name.as_str()) {
            diagnostics.add_warning_with_column(
                diagnostics::TRANSFORM,
                "published name declared more than once; keeping the first mapping",
                &entry.published_name,
            );
            continue;
        }

        let mut expr = match entry.conversion_factor {
            Some(factor) => col(source).cast(DataType::Float64) * lit(factor),
            None => col(source),
        };
        if entry.published_name == BLDG_ID {
            expr = expr.cast(DataType::Int64);
        }
        exprs.push(expr.alias(&entry.published_name));
    }

    let mut passthrough: Vec<&String> = present
        .iter()
        .filter(|name| is_upgrade_cost_name(name) && !produced.contains(name.as_str()))
        .collect();
    passthrough.sort();
    exprs.extend(passthrough.into_iter().map(|name| col(name)));

    if skipped > 0 {
        diagnostics.add_warning(
            diagnostics::TRANSFORM,
            &format!("{skipped} catalog column(s) had no source in the raw table"),
        );
    }

    Ok(lf.select(exprs))
}
