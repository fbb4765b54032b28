//! Site-energy totals restricted to the published fuels.
//!
//! The simulation's own site total includes coal and wood; the published
//! total is rebuilt from electricity, natural gas, fuel oil and propane only.

use polars::prelude::*;

use crate::diagnostics::{self, Diagnostics};
use crate::error::RespubResult;
use crate::frame::schema_names;

pub const SITE_ENERGY_SUFFIXES: [&str; 4] = ["", "_intensity", ".kwh", ".kwh.savings"];

/// Fuels summed into the published site total, in summation order.
pub const SITE_ENERGY_FUELS: [&str; 4] = ["electricity", "natural_gas", "fuel_oil", "propane"];

fn consumption(fuel: &str, suffix: &str) -> String {
    format!("out.{fuel}.total.energy_consumption{suffix}")
}

fn pv_consumption(suffix: &str) -> String {
    format!("out.electricity.pv.energy_consumption{suffix}")
}

/// Recompute `out.site_energy.total.*` and, where PV output exists,
/// `out.site_energy.net.*` and `out.electricity.net.*` for every suffix
/// variant whose electricity total is present.
pub fn fix_site_energy_total(
    lf: LazyFrame,
    diagnostics: &mut Diagnostics,
) -> RespubResult<LazyFrame> {
    let columns = schema_names(&lf)?;
    let present = |name: &str| columns.iter().any(|c| c == name);
    let mut updated = Vec::new();

    for suffix in SITE_ENERGY_SUFFIXES {
        let electricity = consumption("electricity", suffix);
        if !present(&electricity) {
            continue;
        }
        let total = SITE_ENERGY_FUELS
            .iter()
            .map(|fuel| consumption(fuel, suffix))
            .filter(|name| present(name))
            .fold(lit(0.0), |acc, name| {
                acc + col(&name).cast(DataType::Float64)
            });
        updated.push(
            total
                .clone()
                .alias(&format!("out.site_energy.total.energy_consumption{suffix}")),
        );

        let pv = pv_consumption(suffix);
        if !present(&pv) {
            diagnostics.add_warning_with_column(
                diagnostics::DERIVE,
                "PV consumption absent; net energy columns not derived",
                &pv,
            );
            continue;
        }
        let pv_expr = col(&pv).cast(DataType::Float64);
        updated.push(
            (total + pv_expr.clone())
                .alias(&format!("out.site_energy.net.energy_consumption{suffix}")),
        );
        updated.push(
            (col(&electricity).cast(DataType::Float64) + pv_expr)
                .alias(&format!("out.electricity.net.energy_consumption{suffix}")),
        );
    }

    if updated.is_empty() {
        return Ok(lf);
    }
    Ok(lf.with_columns(updated))
}
