//! Representative income from precomputed income-bin tables.
//!
//! Buildings are matched against the most specific geography first and fall
//! back to coarser ones until every building has a value or the tables run
//! out. The tables themselves are loaded by `respub_io::lookups`.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use tracing::{debug, info};

use crate::columns::{BLDG_ID, INCOME, INCOME_NOT_AVAILABLE, REPRESENTATIVE_INCOME};
use crate::derive::income::{add_energy_burden, verify_representative_income};
use crate::diagnostics::Diagnostics;
use crate::error::{RespubError, RespubResult};
use crate::frame::{column_f64, column_i64, column_utf8, filter_rows, has_column};

const WEIGHTED_MEDIAN: &str = "weighted_median";

/// Non-geographic dependencies shared by every lookup table, in key order.
const NON_GEO_DEPENDENCIES: [&str; 5] = [
    "Occupants",
    "Federal Poverty Level",
    "Income",
    "Tenure",
    "Geometry Building Type RECS",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Geography {
    CountyAndPuma,
    Puma,
    State,
    CensusDivision,
    CensusRegion,
    National,
    National2,
}

impl Geography {
    /// Fallback order, most specific first.
    pub const ALL: [Geography; 7] = [
        Geography::CountyAndPuma,
        Geography::Puma,
        Geography::State,
        Geography::CensusDivision,
        Geography::CensusRegion,
        Geography::National,
        Geography::National2,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Geography::CountyAndPuma => "County and PUMA",
            Geography::Puma => "PUMA",
            Geography::State => "State",
            Geography::CensusDivision => "Census Division",
            Geography::CensusRegion => "Census Region",
            Geography::National => "National",
            Geography::National2 => "National2",
        }
    }

    /// File name of the income-bin table for this geography.
    pub fn table_file(&self) -> String {
        let ext = match self {
            Geography::CountyAndPuma => {
                "CountyandPUMA_Occupants_FederalPovertyLevel_Tenure_GeometryBuildingTypeRECS"
            }
            Geography::Puma => "PUMA_Occupants_FederalPovertyLevel_Tenure_GeometryBuildingTypeRECS",
            Geography::State => {
                "State_Occupants_FederalPovertyLevel_Tenure_GeometryBuildingTypeRECS"
            }
            Geography::CensusDivision => {
                "CensusDivision_Occupants_FederalPovertyLevel_Tenure_GeometryBuildingTypeRECS"
            }
            Geography::CensusRegion => {
                "CensusRegion_Occupants_FederalPovertyLevel_Tenure_GeometryBuildingTypeRECS"
            }
            Geography::National => "Occupants_FederalPovertyLevel_Tenure_GeometryBuildingTypeRECS",
            Geography::National2 => "Occupants_FederalPovertyLevel",
        };
        format!("income_bin_representative_values_by_{ext}.parquet")
    }

    /// Column labels as they appear in the raw lookup table.
    pub fn dependencies(&self) -> Vec<&'static str> {
        match self {
            Geography::National => NON_GEO_DEPENDENCIES.to_vec(),
            Geography::National2 => NON_GEO_DEPENDENCIES[..3].to_vec(),
            geo => std::iter::once(geo.label())
                .chain(NON_GEO_DEPENDENCIES)
                .collect(),
        }
    }

    /// Join keys in published column space (`in.<lower_snake>`).
    pub fn key_columns(&self) -> Vec<String> {
        self.dependencies()
            .into_iter()
            .map(published_input_name)
            .collect()
    }
}

/// `"Federal Poverty Level"` -> `"in.federal_poverty_level"`.
pub fn published_input_name(label: &str) -> String {
    format!("in.{}", label.to_lowercase().replace(' ', "_"))
}

#[derive(Debug, Clone, Default)]
pub struct IncomeLookup {
    tables: Vec<(Geography, DataFrame)>,
}

impl IncomeLookup {
    /// Register tables already normalized with [`normalize_table`]. Tables
    /// are consulted in [`Geography::ALL`] order regardless of input order.
    pub fn new(mut tables: Vec<(Geography, DataFrame)>) -> RespubResult<Self> {
        for (geo, table) in &tables {
            for key in geo.key_columns() {
                if !has_column(table, &key) {
                    return Err(RespubError::Config(format!(
                        "income table for {} lacks key column '{key}'",
                        geo.label()
                    )));
                }
            }
            if !has_column(table, REPRESENTATIVE_INCOME) {
                return Err(RespubError::Config(format!(
                    "income table for {} lacks '{REPRESENTATIVE_INCOME}'",
                    geo.label()
                )));
            }
        }
        tables.sort_by_key(|(geo, _)| Geography::ALL.iter().position(|g| g == geo));
        Ok(Self { tables })
    }

    pub fn geographies(&self) -> Vec<Geography> {
        self.tables.iter().map(|(geo, _)| *geo).collect()
    }

    /// Map each building to its representative income, in input row order.
    pub fn representative_incomes(&self, df: &DataFrame) -> RespubResult<Vec<Option<f64>>> {
        let ids = column_i64(df, BLDG_ID)?;
        let mut found: HashMap<i64, f64> = HashMap::new();

        let mut remaining = key_frame(df, &self.tables)?;
        for (geo, table) in &self.tables {
            if remaining.height() == 0 {
                break;
            }
            let keys = geo.key_columns();
            if keys.iter().any(|key| !has_column(&remaining, key)) {
                debug!(geography = geo.label(), "skipping income geography; keys absent");
                continue;
            }
            let key_exprs: Vec<Expr> = keys.iter().map(|key| col(key)).collect();
            let mut lookup_cols = key_exprs.clone();
            lookup_cols.push(col(REPRESENTATIVE_INCOME));

            let joined = remaining
                .clone()
                .lazy()
                .join(
                    table.clone().lazy().select(lookup_cols),
                    key_exprs.clone(),
                    key_exprs,
                    JoinArgs::new(JoinType::Left),
                )
                .collect()?;

            let joined_ids = column_i64(&joined, BLDG_ID)?;
            let values = column_f64(&joined, REPRESENTATIVE_INCOME)?;
            let mut unmatched = Vec::with_capacity(values.len());
            for (id, value) in joined_ids.iter().zip(&values) {
                match (id, value) {
                    (Some(id), Some(value)) => {
                        found.entry(*id).or_insert(*value);
                        unmatched.push(false);
                    }
                    _ => unmatched.push(true),
                }
            }
            remaining = filter_rows(&joined, &unmatched)?.drop(REPRESENTATIVE_INCOME)?;
            if remaining.height() == 0 {
                info!("Income mapping completed, highest resolution used: {}", geo.label());
            }
        }

        Ok(ids
            .into_iter()
            .map(|id| id.and_then(|id| found.get(&id).copied()))
            .collect())
    }
}

/// Rename a raw income-bin table into published key space, round the
/// weighted median to whole dollars, drop incomplete and duplicate rows.
pub fn normalize_table(geo: Geography, raw: &DataFrame) -> RespubResult<DataFrame> {
    let deps = geo.dependencies();
    let mut key_values = Vec::with_capacity(deps.len());
    for dep in &deps {
        if !has_column(raw, dep) {
            return Err(RespubError::Config(format!(
                "income table for {} lacks column '{dep}'",
                geo.label()
            )));
        }
        key_values.push(column_utf8(raw, dep)?);
    }
    let medians = column_f64(raw, WEIGHTED_MEDIAN)?;

    let mut seen = HashSet::new();
    let keep: Vec<bool> = (0..raw.height())
        .map(|row| {
            let key: Option<Vec<&str>> = key_values
                .iter()
                .map(|values| values[row].as_deref())
                .collect();
            match (key, medians[row]) {
                (Some(key), Some(_)) => seen.insert(key.join("\u{1f}")),
                _ => false,
            }
        })
        .collect();

    let mut columns: Vec<Series> = deps
        .iter()
        .zip(key_values)
        .map(|(dep, values)| Series::new(&published_input_name(dep), values))
        .collect();
    let rounded: Vec<Option<f64>> = medians.into_iter().map(|v| v.map(f64::round)).collect();
    columns.push(Series::new(REPRESENTATIVE_INCOME, rounded));

    filter_rows(&DataFrame::new(columns)?, &keep)
}

/// Attach `in.representative_income` from the lookup tables (or return only
/// the `[bldg_id, in.representative_income]` map), enforcing the income QC.
pub fn assign_representative_income(
    mut df: DataFrame,
    lookup: &IncomeLookup,
    map_only: bool,
) -> RespubResult<DataFrame> {
    let incomes = lookup.representative_incomes(&df)?;
    df.with_column(Series::new(REPRESENTATIVE_INCOME, incomes))?;
    verify_representative_income(&df)?;
    info!(
        "Note: {REPRESENTATIVE_INCOME} is not available for vacant units, which have '{INCOME_NOT_AVAILABLE}' for {INCOME}"
    );
    if map_only {
        return Ok(df.select([BLDG_ID, REPRESENTATIVE_INCOME])?);
    }
    Ok(df)
}

/// Lookup-table counterpart of [`crate::derive::income::add_income_and_burden`].
pub fn add_income_and_burden_from_lookup(
    df: DataFrame,
    lookup: &IncomeLookup,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    let df = assign_representative_income(df, lookup, false)?;
    add_energy_burden(df, diagnostics)
}

/// `bldg_id` plus every key column any table needs, all as strings so the
/// joins compare like with like.
fn key_frame(df: &DataFrame, tables: &[(Geography, DataFrame)]) -> RespubResult<DataFrame> {
    let mut keys: Vec<String> = Vec::new();
    for (geo, _) in tables {
        for key in geo.key_columns() {
            if !keys.contains(&key) && has_column(df, &key) {
                keys.push(key);
            }
        }
    }
    let mut columns = vec![df.column(BLDG_ID)?.cast(&DataType::Int64)?];
    for key in &keys {
        columns.push(df.column(key)?.cast(&DataType::Utf8)?);
    }
    Ok(DataFrame::new(columns)?)
}
