//! Static lookup assets: the column catalog, county and PUMA code tables,
//! and the income-bin representative-value tables.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use respub_core::derive::income_map::normalize_table;
use respub_core::{CatalogRecord, ColumnCatalog, GeoLookups, Geography, IncomeLookup};
use serde::Deserialize;
use tracing::{debug, info};

/// Load the column-definition table.
pub fn load_catalog(path: &Path) -> Result<ColumnCatalog> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening column definitions '{}'", path.display()))?;
    let records = reader
        .deserialize::<CatalogRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("parsing column definitions '{}'", path.display()))?;
    let catalog = ColumnCatalog::from_records(records)
        .with_context(|| format!("validating column definitions '{}'", path.display()))?;
    info!(columns = catalog.len(), path = %path.display(), "loaded column catalog");
    Ok(catalog)
}

#[derive(Debug, Deserialize)]
struct CountyRow {
    long_name: String,
    #[serde(rename = "original_FIP")]
    original_fip: String,
}

#[derive(Debug, Deserialize)]
struct PumaRow {
    puma_tsv: String,
    #[serde(rename = "GISJOIN")]
    gisjoin: String,
}

/// Read a two-column code table into a map. Extra columns are ignored.
fn read_code_map<R, F>(path: &Path, what: &str, pair: F) -> Result<HashMap<String, String>>
where
    R: for<'de> Deserialize<'de>,
    F: Fn(R) -> (String, String),
{
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {what} lookup '{}'", path.display()))?;
    let mut map = HashMap::new();
    for row in reader.deserialize::<R>() {
        let row = row.with_context(|| format!("parsing {what} lookup '{}'", path.display()))?;
        let (key, value) = pair(row);
        map.entry(key).or_insert(value);
    }
    debug!(entries = map.len(), "loaded {what} lookup");
    Ok(map)
}

/// County long name (`"CO, Denver County"`) to FIPS code.
pub fn load_county_lookup(path: &Path) -> Result<HashMap<String, String>> {
    read_code_map(path, "county", |row: CountyRow| (row.long_name, row.original_fip))
}

/// PUMA text code to GIS join identifier.
pub fn load_puma_lookup(path: &Path) -> Result<HashMap<String, String>> {
    read_code_map(path, "PUMA", |row: PumaRow| (row.puma_tsv, row.gisjoin))
}

pub fn load_geo_lookups(county: &Path, puma: &Path) -> Result<GeoLookups> {
    Ok(GeoLookups::new(
        load_county_lookup(county)?,
        load_puma_lookup(puma)?,
    ))
}

/// Load every income-bin table present in `dir`. Geographies without a
/// table are skipped; at least one table is required.
pub fn load_income_lookup(dir: &Path) -> Result<IncomeLookup> {
    let mut tables = Vec::new();
    for geo in Geography::ALL {
        let path = dir.join(geo.table_file());
        if !path.is_file() {
            debug!(geography = geo.label(), path = %path.display(), "income table not present");
            continue;
        }
        let file = File::open(&path)
            .with_context(|| format!("opening income table '{}'", path.display()))?;
        let raw = ParquetReader::new(file)
            .finish()
            .with_context(|| format!("reading income table '{}'", path.display()))?;
        let table = normalize_table(geo, &raw)
            .with_context(|| format!("normalizing income table '{}'", path.display()))?;
        tables.push((geo, table));
    }
    if tables.is_empty() {
        return Err(anyhow!(
            "no income-bin tables found in '{}'",
            dir.display()
        ));
    }
    info!(tables = tables.len(), "loaded income lookup tables");
    Ok(IncomeLookup::new(tables)?)
}
