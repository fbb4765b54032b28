//! Baseline/upgrade reconciliation.
//!
//! Every upgrade's published table covers exactly the buildings of the
//! published baseline. Buildings that failed in the baseline are gone
//! everywhere; buildings that failed only in an upgrade are backfilled from
//! the baseline with `applicability = false`.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::*;
use tracing::{info, warn};

use crate::columns::{
    APPLICABILITY, BASELINE_NAME, BLDG_ID, BUILDING_ID, COMPLETED_STATUS, EMISSIONS_PREFIX,
    EMISSIONS_REDUCTION_PREFIX, OUTPUT_PREFIX, SAVINGS_SUFFIX, STATUS_FAIL, STATUS_SUCCESS,
    UPGRADE, UPGRADE_NAME,
};
use crate::diagnostics::{self, Diagnostics};
use crate::error::{RespubError, RespubResult};
use crate::frame::{
    column_i64, column_names, column_utf8, concat_relaxed, filter_rows, has_column,
    schema_names, sort_by,
};

/// Panel outputs that still get savings columns.
pub const PANEL_SAVINGS_ALLOW_LIST: [&str; 3] = [
    "out.panel.load.total_load.",
    "out.panel.load.occupied_capacity.",
    "out.panel.breaker_space.occupied.",
];

const BASELINE_VALUE_PREFIX: &str = "baseline_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRecord {
    pub upgrade_number: u32,
    pub upgrade_name: Option<String>,
    pub applicability: bool,
}

impl UpgradeRecord {
    pub fn baseline() -> Self {
        Self {
            upgrade_number: 0,
            upgrade_name: Some(BASELINE_NAME.to_string()),
            applicability: true,
        }
    }

    pub fn upgrade(upgrade_number: u32, upgrade_name: Option<String>) -> Self {
        Self {
            upgrade_number,
            upgrade_name,
            applicability: true,
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.upgrade_number == 0
    }
}

/// Buildings whose baseline simulation failed. Computed once from the raw
/// baseline and excluded from every published table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedBuildingSet {
    ids: BTreeSet<i64>,
}

impl FailedBuildingSet {
    pub fn from_raw_baseline(raw: &DataFrame) -> RespubResult<Self> {
        let ids = ids_with_status(raw, STATUS_FAIL)?.into_iter().collect();
        Ok(Self { ids })
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<i64> for FailedBuildingSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

fn require_status_columns(raw: &DataFrame) -> RespubResult<()> {
    for column in [BUILDING_ID, COMPLETED_STATUS] {
        if !has_column(raw, column) {
            return Err(RespubError::Validation(format!(
                "raw results lack the '{column}' column"
            )));
        }
    }
    Ok(())
}

fn ids_with_status(raw: &DataFrame, status: &str) -> RespubResult<Vec<i64>> {
    require_status_columns(raw)?;
    let ids = column_i64(raw, BUILDING_ID)?;
    let statuses = column_utf8(raw, COMPLETED_STATUS)?;
    Ok(ids
        .into_iter()
        .zip(statuses)
        .filter_map(|(id, s)| match (id, s.as_deref()) {
            (Some(id), Some(s)) if s == status => Some(id),
            _ => None,
        })
        .collect())
}

/// Keep only successfully simulated rows.
pub fn successful_rows(raw: &DataFrame) -> RespubResult<DataFrame> {
    require_status_columns(raw)?;
    let keep: Vec<bool> = column_utf8(raw, COMPLETED_STATUS)?
        .iter()
        .map(|status| status.as_deref() == Some(STATUS_SUCCESS))
        .collect();
    filter_rows(raw, &keep)
}

/// Raw upgrade rows after the failure policy, plus the buildings that
/// failed only in this upgrade.
#[derive(Debug, Clone)]
pub struct FilteredUpgrade {
    pub frame: DataFrame,
    pub upgrade_only_failures: Vec<i64>,
}

/// Drop baseline-failed buildings and keep successful rows.
pub fn filter_upgrade_rows(
    raw: &DataFrame,
    failed: &FailedBuildingSet,
) -> RespubResult<FilteredUpgrade> {
    require_status_columns(raw)?;
    let ids = column_i64(raw, BUILDING_ID)?;
    let statuses = column_utf8(raw, COMPLETED_STATUS)?;

    let mut upgrade_only_failures = Vec::new();
    let keep: Vec<bool> = ids
        .iter()
        .zip(&statuses)
        .map(|(id, status)| {
            let in_failed = id.is_some_and(|id| failed.contains(id));
            let status = status.as_deref();
            if status == Some(STATUS_FAIL) && !in_failed {
                if let Some(id) = id {
                    upgrade_only_failures.push(*id);
                }
            }
            !in_failed && status == Some(STATUS_SUCCESS)
        })
        .collect();

    Ok(FilteredUpgrade {
        frame: filter_rows(raw, &keep)?,
        upgrade_only_failures,
    })
}

/// Copy in, by `bldg_id`, every baseline column the upgrade table lacks.
/// Identity columns are never copied.
pub fn fill_missing_columns(upgrade: LazyFrame, baseline: &DataFrame) -> RespubResult<LazyFrame> {
    let present: HashSet<String> = schema_names(&upgrade)?.into_iter().collect();
    let missing: Vec<String> = column_names(baseline)
        .into_iter()
        .filter(|name| !present.contains(name))
        .filter(|name| ![UPGRADE, UPGRADE_NAME, APPLICABILITY].contains(&name.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(upgrade);
    }

    let mut selected = vec![col(BLDG_ID)];
    selected.extend(missing.iter().map(|name| col(name)));
    Ok(upgrade.join(
        baseline.clone().lazy().select(selected),
        [col(BLDG_ID)],
        [col(BLDG_ID)],
        JoinArgs::new(JoinType::Left),
    ))
}

/// Drop upgrade rows for buildings the baseline does not publish.
pub fn restrict_to_baseline(
    upgrade: DataFrame,
    baseline: &DataFrame,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    let baseline_ids: HashSet<i64> = column_i64(baseline, BLDG_ID)?.into_iter().flatten().collect();
    let ids = column_i64(&upgrade, BLDG_ID)?;
    let keep: Vec<bool> = ids
        .iter()
        .map(|id| id.is_some_and(|id| baseline_ids.contains(&id)))
        .collect();
    let dropped = keep.iter().filter(|keep| !**keep).count();
    if dropped == 0 {
        return Ok(upgrade);
    }
    warn!(dropped, "upgrade rows without a published baseline row dropped");
    diagnostics.add_warning(
        diagnostics::RECONCILE,
        &format!("{dropped} upgrade row(s) had no published baseline row and were dropped"),
    );
    filter_rows(&upgrade, &keep)
}

/// The single upgrade name carried by an upgrade table.
pub fn first_upgrade_name(df: &DataFrame) -> RespubResult<Option<String>> {
    if !has_column(df, UPGRADE_NAME) {
        return Ok(None);
    }
    Ok(column_utf8(df, UPGRADE_NAME)?.into_iter().flatten().next())
}

/// Stamp `upgrade`, `upgrade_name` and `applicability` on every row.
pub fn tag_rows(lf: LazyFrame, record: &UpgradeRecord) -> LazyFrame {
    let name = match &record.upgrade_name {
        Some(name) => lit(name.as_str()),
        None => lit(NULL).cast(DataType::Utf8),
    };
    lf.with_columns([
        lit(record.upgrade_number as i64).alias(UPGRADE),
        name.alias(UPGRADE_NAME),
        lit(record.applicability).alias(APPLICABILITY),
    ])
}

/// Result of the missing-building backfill.
#[derive(Debug, Clone)]
pub struct Backfilled {
    pub frame: DataFrame,
    pub backfilled_ids: Vec<i64>,
}

/// Reinsert baseline rows for buildings absent from the upgrade table, as
/// not applicable, and return the union sorted by `bldg_id`.
pub fn backfill_missing_buildings(
    upgrade: DataFrame,
    baseline: &DataFrame,
    upgrade_number: u32,
    upgrade_name: Option<String>,
) -> RespubResult<Backfilled> {
    let upgrade_ids: HashSet<i64> = column_i64(&upgrade, BLDG_ID)?.into_iter().flatten().collect();
    let baseline_ids = column_i64(baseline, BLDG_ID)?;
    let absent: Vec<bool> = baseline_ids
        .iter()
        .map(|id| id.map_or(true, |id| !upgrade_ids.contains(&id)))
        .collect();
    let backfilled_ids: Vec<i64> = baseline_ids
        .iter()
        .zip(&absent)
        .filter_map(|(id, absent)| if *absent { *id } else { None })
        .collect();

    if backfilled_ids.is_empty() {
        return Ok(Backfilled {
            frame: sort_by(upgrade, BLDG_ID)?,
            backfilled_ids,
        });
    }
    info!(
        upgrade = upgrade_number,
        count = backfilled_ids.len(),
        "backfilling buildings from baseline as not applicable"
    );

    let record = UpgradeRecord {
        upgrade_number,
        upgrade_name,
        applicability: false,
    };
    let missing = tag_rows(filter_rows(baseline, &absent)?.lazy(), &record).collect()?;
    let combined = concat_relaxed(&upgrade, &missing)?;
    Ok(Backfilled {
        frame: sort_by(combined, BLDG_ID)?,
        backfilled_ids,
    })
}

/// `out.emissions*` columns become `out.emissions_reduction*`; everything
/// else gets a `.savings` suffix.
pub fn savings_column_name(column: &str) -> String {
    if column.starts_with(EMISSIONS_PREFIX) {
        column.replacen(EMISSIONS_PREFIX, EMISSIONS_REDUCTION_PREFIX, 1)
    } else {
        format!("{column}{SAVINGS_SUFFIX}")
    }
}

/// Output columns that get a savings counterpart.
pub fn is_savings_source(column: &str) -> bool {
    if !column.starts_with(OUTPUT_PREFIX)
        || column.ends_with(SAVINGS_SUFFIX)
        || column.starts_with(EMISSIONS_REDUCTION_PREFIX)
    {
        return false;
    }
    if PANEL_SAVINGS_ALLOW_LIST
        .iter()
        .any(|prefix| column.starts_with(prefix))
    {
        return true;
    }
    !column.starts_with("out.params") && !column.starts_with("out.panel")
}

/// Add `baseline - upgrade` for every savings source column the baseline
/// also publishes. Values are compared as Float64.
pub fn add_savings_columns(df: DataFrame, baseline: &DataFrame) -> RespubResult<DataFrame> {
    let baseline_columns: HashSet<String> = column_names(baseline).into_iter().collect();
    let sources: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|name| is_savings_source(name) && baseline_columns.contains(name))
        .collect();
    if sources.is_empty() {
        return Ok(df);
    }

    let mut baseline_values = vec![col(BLDG_ID)];
    baseline_values.extend(
        sources
            .iter()
            .map(|name| col(name).alias(&format!("{BASELINE_VALUE_PREFIX}{name}"))),
    );
    let savings: Vec<Expr> = sources
        .iter()
        .map(|name| {
            (col(&format!("{BASELINE_VALUE_PREFIX}{name}")).cast(DataType::Float64)
                - col(name).cast(DataType::Float64))
            .alias(&savings_column_name(name))
        })
        .collect();
    let scratch: Vec<String> = sources
        .iter()
        .map(|name| format!("{BASELINE_VALUE_PREFIX}{name}"))
        .collect();

    let joined = df
        .lazy()
        .join(
            baseline.clone().lazy().select(baseline_values),
            [col(BLDG_ID)],
            [col(BLDG_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(savings)
        .collect()?;
    Ok(joined.drop_many(&scratch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column_f64;

    fn raw_baseline() -> DataFrame {
        df![
            "building_id" => &[1i64, 2, 3, 4],
            "completed_status" => &["Success", "Fail", "Success", "Success"],
        ]
        .unwrap()
    }

    fn published_baseline() -> DataFrame {
        df![
            "bldg_id" => &[1i64, 3, 4],
            "upgrade" => &[0i64, 0, 0],
            "upgrade_name" => &["Baseline", "Baseline", "Baseline"],
            "applicability" => &[true, true, true],
            "in.sqft" => &[1000.0f64, 1500.0, 2000.0],
            "out.electricity.total.energy_consumption" => &[100.0f64, 200.0, 300.0],
            "out.emissions.aer.co2e_kg" => &[10.0f64, 20.0, 30.0],
        ]
        .unwrap()
    }

    #[test]
    fn failed_set_comes_from_raw_baseline() {
        let failed = FailedBuildingSet::from_raw_baseline(&raw_baseline()).unwrap();
        assert_eq!(failed.iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn missing_status_column_is_rejected() {
        let raw = df!["building_id" => &[1i64]].unwrap();
        let err = FailedBuildingSet::from_raw_baseline(&raw).unwrap_err();
        assert!(matches!(err, RespubError::Validation(_)));
    }

    #[test]
    fn upgrade_filter_tracks_upgrade_only_failures() {
        let raw = df![
            "building_id" => &[1i64, 2, 3, 4],
            "completed_status" => &["Success", "Fail", "Fail", "Success"],
        ]
        .unwrap();
        let failed: FailedBuildingSet = [2i64].into_iter().collect();
        let filtered = filter_upgrade_rows(&raw, &failed).unwrap();
        assert_eq!(
            column_i64(&filtered.frame, BUILDING_ID).unwrap(),
            vec![Some(1), Some(4)]
        );
        assert_eq!(filtered.upgrade_only_failures, vec![3]);
    }

    #[test]
    fn savings_names_follow_emissions_convention() {
        assert_eq!(
            savings_column_name("out.emissions.scenario_x.co2e_kg"),
            "out.emissions_reduction.scenario_x.co2e_kg"
        );
        assert_eq!(
            savings_column_name("out.electricity.total.energy_consumption"),
            "out.electricity.total.energy_consumption.savings"
        );
    }

    #[test]
    fn savings_sources_respect_panel_allow_list() {
        assert!(is_savings_source("out.panel.load.total_load.a"));
        assert!(is_savings_source("out.panel.breaker_space.occupied.count"));
        assert!(!is_savings_source("out.panel.load.headroom_capacity.x.a"));
        assert!(!is_savings_source("out.params.sqft"));
        assert!(!is_savings_source("in.sqft"));
        assert!(!is_savings_source("out.electricity.total.energy_consumption.savings"));
    }

    #[test]
    fn backfill_restores_population_as_not_applicable() {
        let upgrade = df![
            "bldg_id" => &[4i64, 1],
            "upgrade" => &[1i64, 1],
            "upgrade_name" => &["Heat pump", "Heat pump"],
            "applicability" => &[true, true],
            "out.electricity.total.energy_consumption" => &[250.0f64, 120.0],
            "upgrade.hvac" => &["ASHP", "ASHP"],
        ]
        .unwrap();
        let baseline = published_baseline();
        let upgrade = fill_missing_columns(upgrade.lazy(), &baseline)
            .unwrap()
            .collect()
            .unwrap();
        let result =
            backfill_missing_buildings(upgrade, &baseline, 1, Some("Heat pump".to_string()))
                .unwrap();

        assert_eq!(result.backfilled_ids, vec![3]);
        let frame = result.frame;
        assert_eq!(
            column_i64(&frame, BLDG_ID).unwrap(),
            vec![Some(1), Some(3), Some(4)]
        );
        let applicable: Vec<Option<bool>> =
            frame.column(APPLICABILITY).unwrap().bool().unwrap().into_iter().collect();
        assert_eq!(applicable, vec![Some(true), Some(false), Some(true)]);
        assert_eq!(
            column_i64(&frame, UPGRADE).unwrap(),
            vec![Some(1), Some(1), Some(1)]
        );
        let names = column_utf8(&frame, UPGRADE_NAME).unwrap();
        assert!(names.iter().all(|n| n.as_deref() == Some("Heat pump")));
        // Baseline values carried over for the backfilled building and
        // filled in for the columns the upgrade lacked.
        let sqft = column_f64(&frame, "in.sqft").unwrap();
        assert_eq!(sqft, vec![Some(1000.0), Some(1500.0), Some(2000.0)]);
        let details = column_utf8(&frame, "upgrade.hvac").unwrap();
        assert_eq!(details[1], None);
    }

    #[test]
    fn savings_are_baseline_minus_upgrade() {
        let upgrade = df![
            "bldg_id" => &[1i64, 3, 4],
            "out.electricity.total.energy_consumption" => &[120.0f64, 200.0, 250.0],
            "out.emissions.aer.co2e_kg" => &[12.0f64, 20.0, 5.0],
            "out.only_in_upgrade" => &[1.0f64, 1.0, 1.0],
        ]
        .unwrap();
        let out = add_savings_columns(upgrade, &published_baseline()).unwrap();

        let savings =
            column_f64(&out, "out.electricity.total.energy_consumption.savings").unwrap();
        assert_eq!(savings, vec![Some(-20.0), Some(0.0), Some(50.0)]);
        let reduction = column_f64(&out, "out.emissions_reduction.aer.co2e_kg").unwrap();
        assert_eq!(reduction, vec![Some(-2.0), Some(0.0), Some(25.0)]);
        assert!(!has_column(&out, "out.emissions.aer.co2e_kg.savings"));
        assert!(!has_column(&out, "out.only_in_upgrade.savings"));
        assert!(!column_names(&out).iter().any(|c| c.starts_with("baseline_")));
    }

    #[test]
    fn rows_outside_baseline_are_dropped() {
        let upgrade = df!["bldg_id" => &[1i64, 2, 3]].unwrap();
        let mut diag = Diagnostics::new();
        let out = restrict_to_baseline(upgrade, &published_baseline(), &mut diag).unwrap();
        assert_eq!(column_i64(&out, BLDG_ID).unwrap(), vec![Some(1), Some(3)]);
        assert_eq!(diag.issues_by_category(diagnostics::RECONCILE).count(), 1);
    }
}
