//! County and PUMA code normalization against static lookup tables.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;
use tracing::warn;

use crate::columns::{COUNTY, COUNTY_NAME, PUMA};
use crate::diagnostics::{self, Diagnostics};
use crate::error::RespubResult;
use crate::frame::{column_utf8, has_column};

/// Lookup tables loaded once per run and shared by every stage that needs
/// them.
#[derive(Debug, Clone, Default)]
pub struct GeoLookups {
    /// Full county text (`"CO, Denver County"`) to FIPS code.
    pub county_fips: HashMap<String, String>,
    /// PUMA text code to GIS join identifier.
    pub puma_gisjoin: HashMap<String, String>,
}

impl GeoLookups {
    pub fn new(
        county_fips: HashMap<String, String>,
        puma_gisjoin: HashMap<String, String>,
    ) -> Self {
        Self {
            county_fips,
            puma_gisjoin,
        }
    }
}

/// Display name from the county text: the second comma-separated token,
/// trimmed.
pub fn county_display_name(raw: &str) -> Option<String> {
    raw.split(',').nth(1).map(|name| name.trim().to_string())
}

/// Swap each value for its mapped code. Unmatched values are kept as they
/// are and returned once each, sorted.
fn replace_codes(
    values: Vec<Option<String>>,
    map: &HashMap<String, String>,
) -> (Vec<Option<String>>, BTreeSet<String>) {
    let mut unmatched = BTreeSet::new();
    let replaced = values
        .into_iter()
        .map(|value| {
            value.map(|raw| match map.get(&raw) {
                Some(code) => code.clone(),
                None => {
                    unmatched.insert(raw.clone());
                    raw
                }
            })
        })
        .collect();
    (replaced, unmatched)
}

fn report_unmatched(
    unmatched: BTreeSet<String>,
    column: &str,
    what: &str,
    diagnostics: &mut Diagnostics,
) {
    if !unmatched.is_empty() {
        warn!(column, count = unmatched.len(), "{what} values without a lookup match");
    }
    for value in unmatched {
        diagnostics.add_warning_with_column(
            diagnostics::GEO,
            &format!("{what} '{value}' has no lookup match; kept as is"),
            column,
        );
    }
}

/// Add `in.county_name` and replace `in.county` with its FIPS code.
pub fn add_county_column(
    mut df: DataFrame,
    lookups: &GeoLookups,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    if !has_column(&df, COUNTY) {
        diagnostics.add_warning_with_column(diagnostics::GEO, "county column absent", COUNTY);
        return Ok(df);
    }
    let counties = column_utf8(&df, COUNTY)?;
    let names: Vec<Option<String>> = counties
        .iter()
        .map(|raw| raw.as_deref().and_then(county_display_name))
        .collect();
    let (fips, unmatched) = replace_codes(counties, &lookups.county_fips);
    report_unmatched(unmatched, COUNTY, "county", diagnostics);

    df.with_column(Series::new(COUNTY_NAME, names))?;
    df.with_column(Series::new(COUNTY, fips))?;
    Ok(df)
}

/// Replace `in.puma` with its GIS join identifier.
pub fn add_puma_column(
    mut df: DataFrame,
    lookups: &GeoLookups,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    if !has_column(&df, PUMA) {
        diagnostics.add_warning_with_column(diagnostics::GEO, "PUMA column absent", PUMA);
        return Ok(df);
    }
    let (codes, unmatched) = replace_codes(column_utf8(&df, PUMA)?, &lookups.puma_gisjoin);
    report_unmatched(unmatched, PUMA, "PUMA", diagnostics);
    df.with_column(Series::new(PUMA, codes))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookups() -> GeoLookups {
        GeoLookups::new(
            HashMap::from([(
                "CO, Denver County".to_string(),
                "G0800310".to_string(),
            )]),
            HashMap::from([("CO, 00812".to_string(), "G08000812".to_string())]),
        )
    }

    #[test]
    fn county_is_replaced_and_named() {
        let df = df![
            "in.county" => &["CO, Denver County", "CO, Denver County", "ZZ, Nowhere County", "NoComma"],
        ]
        .unwrap();
        let mut diag = Diagnostics::new();
        let out = add_county_column(df, &lookups(), &mut diag).unwrap();

        let county = column_utf8(&out, COUNTY).unwrap();
        assert_eq!(county[0].as_deref(), Some("G0800310"));
        assert_eq!(county[2].as_deref(), Some("ZZ, Nowhere County"));
        let names = column_utf8(&out, COUNTY_NAME).unwrap();
        assert_eq!(names[0].as_deref(), Some("Denver County"));
        assert_eq!(names[3], None);
        // One warning per distinct unmatched value.
        assert_eq!(diag.issues_by_category(diagnostics::GEO).count(), 2);
    }

    #[test]
    fn puma_is_replaced() {
        let df = df!["in.puma" => &[Some("CO, 00812"), None]].unwrap();
        let mut diag = Diagnostics::new();
        let out = add_puma_column(df, &lookups(), &mut diag).unwrap();
        let puma = column_utf8(&out, PUMA).unwrap();
        assert_eq!(puma, vec![Some("G08000812".to_string()), None]);
        assert!(!diag.has_issues());
    }

    #[test]
    fn missing_column_is_a_warning() {
        let df = df!["bldg_id" => &[1i64]].unwrap();
        let mut diag = Diagnostics::new();
        let out = add_puma_column(df, &lookups(), &mut diag).unwrap();
        assert_eq!(out.width(), 1);
        assert_eq!(diag.warning_count(), 1);
    }
}
