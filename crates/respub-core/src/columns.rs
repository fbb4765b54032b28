//! Column names shared across the pipeline stages.

// ── Raw batch output ────────────────────────────────────────────────────────
pub const BUILDING_ID: &str = "building_id";
pub const COMPLETED_STATUS: &str = "completed_status";
pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_FAIL: &str = "Fail";
pub const UPGRADE_COST_PREFIX: &str = "upgrade_costs.";
pub const UPGRADE_COST_SUFFIX: &str = "_name";

// ── Published identity columns ──────────────────────────────────────────────
pub const BLDG_ID: &str = "bldg_id";
pub const UPGRADE: &str = "upgrade";
pub const UPGRADE_NAME: &str = "upgrade_name";
pub const APPLICABILITY: &str = "applicability";
pub const BASELINE_NAME: &str = "Baseline";
pub const UPGRADE_DETAIL_PREFIX: &str = "upgrade.";

// ── Income & burden ─────────────────────────────────────────────────────────
pub const INCOME: &str = "in.income";
pub const REPRESENTATIVE_INCOME: &str = "in.representative_income";
pub const BILLS_ALL_FUELS: &str = "out.bills.all_fuels.usd";
pub const ENERGY_BURDEN: &str = "out.energy_burden.percentage";
pub const INCOME_NOT_AVAILABLE: &str = "Not Available";

// ── Geography ───────────────────────────────────────────────────────────────
pub const COUNTY: &str = "in.county";
pub const COUNTY_NAME: &str = "in.county_name";
pub const PUMA: &str = "in.puma";

// ── Outputs ─────────────────────────────────────────────────────────────────
pub const OUTPUT_PREFIX: &str = "out.";
pub const EMISSIONS_PREFIX: &str = "out.emissions";
pub const EMISSIONS_REDUCTION_PREFIX: &str = "out.emissions_reduction";
pub const SAVINGS_SUFFIX: &str = ".savings";

// ── Panel ───────────────────────────────────────────────────────────────────
pub const PANEL_HEADROOM_CAPACITY_PREFIX: &str = "out.panel.load.headroom_capacity.";
pub const PANEL_BREAKER_SPACE_HEADROOM: &str = "out.panel.breaker_space.headroom.count";
pub const PANEL_CONSTRAINT_BREAKER_SPACE: &str = "out.panel.constraint.breaker_space";
pub const PANEL_CONSTRAINT_CAPACITY_PREFIX: &str = "out.panel.constraint.capacity.";
pub const PANEL_CONSTRAINT_OVERALL_PREFIX: &str = "out.panel.constraint.overall.";

/// Raw `upgrade_costs.*_name` columns carry measure descriptors that are
/// passed through the transformer and later expanded into `upgrade.*` columns.
pub fn is_upgrade_cost_name(column: &str) -> bool {
    column.starts_with(UPGRADE_COST_PREFIX) && column.ends_with(UPGRADE_COST_SUFFIX)
}

/// Dynamically generated measure-detail column (`upgrade.<key>`).
pub fn is_upgrade_detail(column: &str) -> bool {
    column.starts_with(UPGRADE_DETAIL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_cost_name_matches_only_name_columns() {
        assert!(is_upgrade_cost_name("upgrade_costs.option_01_name"));
        assert!(!is_upgrade_cost_name("upgrade_costs.option_01_cost_usd"));
        assert!(!is_upgrade_cost_name("out.upgrade_costs.option_01_name"));
    }

    #[test]
    fn upgrade_detail_is_distinct_from_upgrade_column() {
        assert!(is_upgrade_detail("upgrade.hvac_heating_efficiency"));
        assert!(!is_upgrade_detail(UPGRADE));
        assert!(!is_upgrade_detail(UPGRADE_NAME));
    }
}
