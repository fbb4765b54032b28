//! Baseline and upgrade publication: the stage sequence that turns a raw
//! batch result table into a published table.

use polars::prelude::*;
use tracing::{debug, info};

use crate::catalog::ColumnCatalog;
use crate::columns::{APPLICABILITY, UPGRADE};
use crate::derive::{
    add_income_and_burden, add_panel_constraints, add_upgrade_columns, fix_all_fuels_emissions,
    fix_site_energy_total, income_map, verify_representative_income, IncomeLookup,
};
use crate::diagnostics::Diagnostics;
use crate::error::RespubResult;
use crate::geo::{add_county_column, add_puma_column, GeoLookups};
use crate::reconcile::{
    add_savings_columns, backfill_missing_buildings, fill_missing_columns, filter_upgrade_rows,
    first_upgrade_name, restrict_to_baseline, successful_rows, tag_rows, FailedBuildingSet,
    UpgradeRecord,
};
use crate::schema::reorder_columns;
use crate::transform::transform_columns;

/// Where `in.representative_income` comes from.
#[derive(Debug, Clone, Default)]
pub enum IncomeSource {
    /// Midpoint of the `in.income` bin label.
    #[default]
    BinMidpoint,
    /// Hierarchical fallback join against income-bin tables.
    Lookup(IncomeLookup),
}

/// Lookups built once per run and shared read-only by every publication.
#[derive(Debug, Clone)]
pub struct PublishContext {
    pub catalog: ColumnCatalog,
    pub geo: GeoLookups,
    pub income: IncomeSource,
}

impl PublishContext {
    pub fn new(catalog: ColumnCatalog, geo: GeoLookups, income: IncomeSource) -> Self {
        Self {
            catalog,
            geo,
            income,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishedTable {
    pub record: UpgradeRecord,
    pub frame: DataFrame,
    pub diagnostics: Diagnostics,
}

/// Published baseline and the buildings excluded from every table because
/// their baseline simulation failed.
#[derive(Debug, Clone)]
pub struct PublishedBaseline {
    pub table: PublishedTable,
    pub failed: FailedBuildingSet,
}

#[derive(Debug, Clone)]
pub struct PublishedUpgrade {
    pub table: PublishedTable,
    /// Buildings reinserted from the baseline as not applicable.
    pub backfilled_ids: Vec<i64>,
    /// Buildings that failed in this upgrade but not in the baseline.
    pub upgrade_only_failures: Vec<i64>,
}

fn add_income(
    df: DataFrame,
    source: &IncomeSource,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    match source {
        IncomeSource::BinMidpoint => {
            let df = add_income_and_burden(df, diagnostics)?;
            verify_representative_income(&df)?;
            Ok(df)
        }
        IncomeSource::Lookup(lookup) => {
            income_map::add_income_and_burden_from_lookup(df, lookup, diagnostics)
        }
    }
}

/// Publish the raw baseline table.
pub fn publish_baseline(raw: DataFrame, ctx: &PublishContext) -> RespubResult<PublishedBaseline> {
    let failed = FailedBuildingSet::from_raw_baseline(&raw)?;
    info!(failed = failed.len(), "publishing baseline results");

    let record = UpgradeRecord::baseline();
    let mut diagnostics = Diagnostics::new();

    let df = successful_rows(&raw)?;
    drop(raw);
    let lf = transform_columns(df.lazy(), &ctx.catalog, &mut diagnostics)?;
    let df = tag_rows(lf, &record).collect()?;

    // Income and geography map values, so they run on the collected frame.
    let df = add_income(df, &ctx.income, &mut diagnostics)?;
    let df = add_county_column(df, &ctx.geo, &mut diagnostics)?;
    let df = add_puma_column(df, &ctx.geo, &mut diagnostics)?;

    debug!("fixing site energy and emission totals for baseline");
    let lf = fix_site_energy_total(df.lazy(), &mut diagnostics)?;
    let df = fix_all_fuels_emissions(lf)?.collect()?;
    let df = add_panel_constraints(df, &mut diagnostics)?;
    let df = add_upgrade_columns(df)?;

    let (frame, schema_diagnostics) = reorder_columns(df, &ctx.catalog, true);
    diagnostics.merge(schema_diagnostics);
    info!(rows = frame.height(), columns = frame.width(), "baseline published");

    Ok(PublishedBaseline {
        table: PublishedTable {
            record,
            frame,
            diagnostics,
        },
        failed,
    })
}

/// Publish one raw upgrade table against the published baseline.
pub fn publish_upgrade(
    raw: DataFrame,
    baseline: &PublishedTable,
    failed: &FailedBuildingSet,
    upgrade_number: u32,
    ctx: &PublishContext,
) -> RespubResult<PublishedUpgrade> {
    info!(upgrade = upgrade_number, "publishing upgrade results");
    let mut diagnostics = Diagnostics::new();

    let filtered = filter_upgrade_rows(&raw, failed)?;
    drop(raw);
    if !filtered.upgrade_only_failures.is_empty() {
        info!(
            upgrade = upgrade_number,
            count = filtered.upgrade_only_failures.len(),
            buildings = ?filtered.upgrade_only_failures,
            "replacing buildings that failed only in this upgrade with baseline"
        );
    }

    let df = transform_columns(filtered.frame.lazy(), &ctx.catalog, &mut diagnostics)?
        .collect()?;
    let df = add_county_column(df, &ctx.geo, &mut diagnostics)?;
    let df = add_puma_column(df, &ctx.geo, &mut diagnostics)?;

    let lf = df
        .lazy()
        .with_column(lit(upgrade_number as i64).alias(UPGRADE));
    let lf = fill_missing_columns(lf, &baseline.frame)?;
    debug!(upgrade = upgrade_number, "fixing site energy and emission totals");
    let lf = fix_site_energy_total(lf, &mut diagnostics)?;
    let df = fix_all_fuels_emissions(lf)?
        .with_column(lit(true).alias(APPLICABILITY))
        .collect()?;

    let df = add_upgrade_columns(df)?;
    let df = restrict_to_baseline(df, &baseline.frame, &mut diagnostics)?;

    let upgrade_name = first_upgrade_name(&df)?;
    let backfilled =
        backfill_missing_buildings(df, &baseline.frame, upgrade_number, upgrade_name.clone())?;
    let df = add_savings_columns(backfilled.frame, &baseline.frame)?;
    let df = add_panel_constraints(df, &mut diagnostics)?;

    let (frame, schema_diagnostics) = reorder_columns(df, &ctx.catalog, false);
    diagnostics.merge(schema_diagnostics);
    info!(
        upgrade = upgrade_number,
        rows = frame.height(),
        backfilled = backfilled.backfilled_ids.len(),
        "upgrade published"
    );

    Ok(PublishedUpgrade {
        table: PublishedTable {
            record: UpgradeRecord::upgrade(upgrade_number, upgrade_name),
            frame,
            diagnostics,
        },
        backfilled_ids: backfilled.backfilled_ids,
        upgrade_only_failures: filtered.upgrade_only_failures,
    })
}
