//! Electrical panel constraint classification.

use polars::prelude::*;

use crate::columns::{
    PANEL_BREAKER_SPACE_HEADROOM, PANEL_CONSTRAINT_BREAKER_SPACE,
    PANEL_CONSTRAINT_CAPACITY_PREFIX, PANEL_CONSTRAINT_OVERALL_PREFIX,
    PANEL_HEADROOM_CAPACITY_PREFIX,
};
use crate::diagnostics::{self, Diagnostics};
use crate::error::RespubResult;
use crate::frame::{column_f64, column_names, has_column};

pub const CAPACITY_AND_SPACE: &str = "Capacity and Space Constrained";
pub const CAPACITY_ONLY: &str = "Capacity Constrained Only";
pub const SPACE_ONLY: &str = "Space Constrained Only";
pub const NO_CONSTRAINT: &str = "No Constraint";

/// `(capacity_constrained, space_constrained)` predicate paired with the
/// label it assigns. Evaluated in order; the first match wins.
pub struct OverallRule {
    pub applies: fn(bool, bool) -> bool,
    pub label: &'static str,
}

pub const OVERALL_RULES: [OverallRule; 4] = [
    OverallRule {
        applies: capacity_and_space,
        label: CAPACITY_AND_SPACE,
    },
    OverallRule {
        applies: capacity_only,
        label: CAPACITY_ONLY,
    },
    OverallRule {
        applies: space_only,
        label: SPACE_ONLY,
    },
    OverallRule {
        applies: unconstrained,
        label: NO_CONSTRAINT,
    },
];

fn capacity_and_space(capacity: bool, space: bool) -> bool {
    capacity && space
}

fn capacity_only(capacity: bool, space: bool) -> bool {
    capacity && !space
}

fn space_only(capacity: bool, space: bool) -> bool {
    !capacity && space
}

fn unconstrained(_: bool, _: bool) -> bool {
    true
}

pub fn classify_overall(capacity: bool, space: bool) -> &'static str {
    OVERALL_RULES
        .iter()
        .find(|rule| (rule.applies)(capacity, space))
        .map_or(NO_CONSTRAINT, |rule| rule.label)
}

/// Headroom at or below zero is a constraint; a missing value is not.
fn constrained(headroom: &[Option<f64>]) -> Vec<bool> {
    headroom
        .iter()
        .map(|value| value.is_some_and(|v| v <= 0.0))
        .collect()
}

/// NEC method name from a capacity-headroom column
/// (`out.panel.load.headroom_capacity.<method>[.a]`).
pub fn capacity_method(column: &str) -> Option<&str> {
    let method = column.strip_prefix(PANEL_HEADROOM_CAPACITY_PREFIX)?;
    Some(method.strip_suffix(".a").unwrap_or(method))
}

/// Add the breaker-space constraint and, for every capacity-headroom
/// method, the capacity and overall constraints.
pub fn add_panel_constraints(
    mut df: DataFrame,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    if !has_column(&df, PANEL_BREAKER_SPACE_HEADROOM) {
        diagnostics.add_warning_with_column(
            diagnostics::DERIVE,
            "breaker-space headroom absent; panel constraints not derived",
            PANEL_BREAKER_SPACE_HEADROOM,
        );
        return Ok(df);
    }

    let space = constrained(&column_f64(&df, PANEL_BREAKER_SPACE_HEADROOM)?);
    let capacity_columns: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|name| capacity_method(name).is_some())
        .collect();

    df.with_column(Series::new(PANEL_CONSTRAINT_BREAKER_SPACE, space.as_slice()))?;
    for column in capacity_columns {
        let Some(method) = capacity_method(&column) else {
            continue;
        };
        let capacity = constrained(&column_f64(&df, &column)?);
        let overall: Vec<&str> = capacity
            .iter()
            .zip(&space)
            .map(|(&cap, &space)| classify_overall(cap, space))
            .collect();
        let capacity_name = format!("{PANEL_CONSTRAINT_CAPACITY_PREFIX}{method}");
        let overall_name = format!("{PANEL_CONSTRAINT_OVERALL_PREFIX}{method}");
        df.with_column(Series::new(&capacity_name, capacity.as_slice()))?;
        df.with_column(Series::new(&overall_name, overall))?;
    }
    Ok(df)
}
