//! All-fuels emissions totals.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

use crate::error::RespubResult;
use crate::frame::schema_names;

static FUEL_EMISSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^out\.(electricity|natural_gas|fuel_oil|propane)\.total\.(\w+)\.co2e_kg$")
        .expect("valid emissions regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fuel {
    Electricity,
    NaturalGas,
    FuelOil,
    Propane,
}

impl Fuel {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "electricity" => Some(Fuel::Electricity),
            "natural_gas" => Some(Fuel::NaturalGas),
            "fuel_oil" => Some(Fuel::FuelOil),
            "propane" => Some(Fuel::Propane),
            _ => None,
        }
    }
}

/// A per-fuel emissions column and the scenario it reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuelEmission {
    pub fuel: Fuel,
    pub scenario: String,
    pub column: String,
}

/// Find the per-fuel emissions columns for the published fuels. Coal, wood
/// and other fuels never match.
pub fn enumerate_fuel_emissions<S: AsRef<str>>(columns: &[S]) -> Vec<FuelEmission> {
    columns
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let caps = FUEL_EMISSION.captures(name)?;
            Some(FuelEmission {
                fuel: Fuel::parse(&caps[1])?,
                scenario: caps[2].to_string(),
                column: name.to_string(),
            })
        })
        .collect()
}

pub fn all_fuels_column(scenario: &str) -> String {
    format!("out.all_fuels.total.{scenario}.co2e_kg")
}

/// Write `out.all_fuels.total.<scenario>.co2e_kg` as the sum of the
/// per-fuel columns for each scenario. Null fuel values count as zero.
pub fn fix_all_fuels_emissions(lf: LazyFrame) -> RespubResult<LazyFrame> {
    let mut by_scenario: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let columns = schema_names(&lf)?;
    for emission in enumerate_fuel_emissions(&columns[..]) {
        by_scenario
            .entry(emission.scenario)
            .or_default()
            .push(emission.column);
    }
    if by_scenario.is_empty() {
        return Ok(lf);
    }

    let totals: Vec<Expr> = by_scenario
        .iter()
        .map(|(scenario, columns)| {
            columns
                .iter()
                .fold(lit(0.0), |acc, column| {
                    acc + col(column).cast(DataType::Float64).fill_null(lit(0.0))
                })
                .alias(&all_fuels_column(scenario))
        })
        .collect();
    Ok(lf.with_columns(totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{column_f64, column_names};

    fn fix(df: DataFrame) -> DataFrame {
        fix_all_fuels_emissions(df.lazy()).unwrap().collect().unwrap()
    }

    #[test]
    fn enumerates_published_fuels_only() {
        let columns = [
            "out.electricity.total.lrmer_low.co2e_kg",
            "out.wood.total.lrmer_low.co2e_kg",
            "out.propane.total.aer_mid.co2e_kg",
            "out.electricity.total.energy_consumption",
        ];
        let found = enumerate_fuel_emissions(&columns[..]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].fuel, Fuel::Electricity);
        assert_eq!(found[0].scenario, "lrmer_low");
        assert_eq!(found[1].fuel, Fuel::Propane);
        assert_eq!(found[1].scenario, "aer_mid");
    }

    #[test]
    fn sums_scenario_and_excludes_wood() {
        let df = df![
            "out.electricity.total.lrmer_low.co2e_kg" => &[1.0f64],
            "out.natural_gas.total.lrmer_low.co2e_kg" => &[2.0f64],
            "out.fuel_oil.total.lrmer_low.co2e_kg" => &[0.5f64],
            "out.wood.total.lrmer_low.co2e_kg" => &[9.0f64],
        ]
        .unwrap();
        let out = fix(df);
        let total = column_f64(&out, "out.all_fuels.total.lrmer_low.co2e_kg").unwrap();
        assert_eq!(total, vec![Some(3.5)]);
    }

    #[test]
    fn null_fuel_value_counts_as_zero() {
        let df = df![
            "out.electricity.total.aer.co2e_kg" => &[Some(2.0f64), None],
            "out.propane.total.aer.co2e_kg" => &[Some(1.0f64), Some(4.0)],
        ]
        .unwrap();
        let out = fix(df);
        let total = column_f64(&out, &all_fuels_column("aer")).unwrap();
        assert_eq!(total, vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn frame_without_emissions_is_unchanged() {
        let df = df!["bldg_id" => &[1i64]].unwrap();
        let out = fix(df);
        assert_eq!(column_names(&out), vec!["bldg_id"]);
    }
}
