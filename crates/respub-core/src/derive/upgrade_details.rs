//! Expansion of raw `upgrade_costs.*_name` descriptors into one
//! `upgrade.<key>` column per measure option key.

use std::collections::HashMap;

use polars::prelude::*;

use crate::columns::{is_upgrade_cost_name, UPGRADE_DETAIL_PREFIX};
use crate::error::RespubResult;
use crate::frame::{column_names, column_utf8};

/// Published column for an option key: `Heating Efficiency` becomes
/// `upgrade.heating_efficiency`.
pub fn detail_column(key: &str) -> String {
    format!(
        "{UPGRADE_DETAIL_PREFIX}{}",
        key.to_lowercase().replace(' ', "_")
    )
}

/// Split a `Key|Value` descriptor into its first two fields. Anything after
/// a second `|` is dropped.
pub fn split_descriptor(raw: &str) -> (&str, Option<&str>) {
    let mut fields = raw.split('|');
    let key = fields.next().unwrap_or(raw);
    (key, fields.next())
}

/// Replace the raw descriptor columns with `upgrade.*` detail columns.
///
/// Descriptor columns are scanned in frame order, rows top to bottom; a
/// detail column appears in the order its key is first seen, and the first
/// value seen for a building and key wins.
pub fn add_upgrade_columns(df: DataFrame) -> RespubResult<DataFrame> {
    let descriptor_columns: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|name| is_upgrade_cost_name(name))
        .collect();
    if descriptor_columns.is_empty() {
        return Ok(df);
    }

    let height = df.height();
    let mut order: Vec<String> = Vec::new();
    let mut details: HashMap<String, Vec<Option<Option<String>>>> = HashMap::new();

    for column in &descriptor_columns {
        for (row, raw) in column_utf8(&df, column)?.into_iter().enumerate() {
            let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
                continue;
            };
            let (key, value) = split_descriptor(&raw);
            let name = detail_column(key);
            let values = details.entry(name.clone()).or_insert_with(|| {
                order.push(name);
                vec![None; height]
            });
            // Outer None marks "not yet seen" so a key-only descriptor still
            // claims the slot.
            if values[row].is_none() {
                values[row] = Some(value.map(str::to_string));
            }
        }
    }

    let mut out = df.drop_many(&descriptor_columns);
    for name in order {
        let Some(values) = details.remove(&name) else {
            continue;
        };
        let flattened: Vec<Option<String>> = values.into_iter().map(Option::flatten).collect();
        out.with_column(Series::new(&name, flattened))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_second_field() {
        assert_eq!(split_descriptor("Windows|Triple|Low-E"), ("Windows", Some("Triple")));
        assert_eq!(split_descriptor("Windows|Triple"), ("Windows", Some("Triple")));
        assert_eq!(split_descriptor("Windows|"), ("Windows", Some("")));
        assert_eq!(split_descriptor("Windows"), ("Windows", None));
    }

    #[test]
    fn detail_column_is_lower_snake() {
        assert_eq!(detail_column("HVAC Heating Efficiency"), "upgrade.hvac_heating_efficiency");
    }

    #[test]
    fn expands_descriptors_into_detail_columns() {
        let df = df![
            "bldg_id" => &[1i64, 2, 3],
            "upgrade_costs.option_01_name" => &[Some("Windows|Triple|Low-E"), Some(""), None],
            "upgrade_costs.option_02_name" => &[Some("Windows|Double"), Some("Water Heater|Heat Pump"), Some("Insulation")],
        ]
        .unwrap();
        let out = add_upgrade_columns(df).unwrap();

        assert_eq!(
            column_names(&out),
            vec![
                "bldg_id",
                "upgrade.windows",
                "upgrade.water_heater",
                "upgrade.insulation"
            ]
        );
        let windows = column_utf8(&out, "upgrade.windows").unwrap();
        assert_eq!(windows, vec![Some("Triple".to_string()), None, None]);
        let water = column_utf8(&out, "upgrade.water_heater").unwrap();
        assert_eq!(water, vec![None, Some("Heat Pump".to_string()), None]);
        let insulation = column_utf8(&out, "upgrade.insulation").unwrap();
        assert_eq!(insulation, vec![None, None, None]);
    }

    #[test]
    fn frame_without_descriptors_passes_through() {
        let df = df!["bldg_id" => &[1i64], "upgrade_costs.option_01_cost_usd" => &[5.0f64]].unwrap();
        let out = add_upgrade_columns(df).unwrap();
        assert_eq!(out.width(), 2);
    }
}
