//! Representative income from the binned `in.income` field, and the energy
//! burden derived from it.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

use crate::columns::{
    BILLS_ALL_FUELS, BLDG_ID, ENERGY_BURDEN, INCOME, INCOME_NOT_AVAILABLE, REPRESENTATIVE_INCOME,
};
use crate::diagnostics::{self, Diagnostics};
use crate::error::{RespubError, RespubResult};
use crate::frame::{column_f64, column_i64, column_utf8, has_column};

static RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)-(\d+)").expect("valid range regex"));
static AT_LEAST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\+").expect("valid plus regex"));
static BELOW: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(\d+)").expect("valid below regex"));

/// One step of the income rule chain. The first rule whose `matches`
/// accepts the text decides the value, even when that value is null.
pub struct IncomeRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub value: fn(&str) -> Option<f64>,
}

pub const INCOME_RULES: [IncomeRule; 5] = [
    IncomeRule {
        name: "not-available",
        matches: is_not_available,
        value: no_income,
    },
    IncomeRule {
        name: "range",
        matches: is_range,
        value: range_midpoint,
    },
    IncomeRule {
        name: "at-least",
        matches: is_open_ended,
        value: open_ended_floor,
    },
    IncomeRule {
        name: "below",
        matches: is_below,
        value: half_of_ceiling,
    },
    IncomeRule {
        name: "numeric",
        matches: always,
        value: direct_number,
    },
];

fn is_not_available(raw: &str) -> bool {
    raw == INCOME_NOT_AVAILABLE || raw.is_empty()
}

fn is_range(raw: &str) -> bool {
    raw.contains('-')
}

fn is_open_ended(raw: &str) -> bool {
    raw.contains('+')
}

fn is_below(raw: &str) -> bool {
    raw.contains('<')
}

fn always(_: &str) -> bool {
    true
}

fn no_income(_: &str) -> Option<f64> {
    None
}

fn range_midpoint(raw: &str) -> Option<f64> {
    let caps = RANGE.captures(raw)?;
    let low: f64 = caps[1].parse().ok()?;
    let high: f64 = caps[2].parse().ok()?;
    Some((low + high) / 2.0)
}

fn open_ended_floor(raw: &str) -> Option<f64> {
    AT_LEAST.captures(raw)?[1].parse().ok()
}

fn half_of_ceiling(raw: &str) -> Option<f64> {
    let ceiling: f64 = BELOW.captures(raw)?[1].parse().ok()?;
    Some(ceiling / 2.0)
}

fn direct_number(raw: &str) -> Option<f64> {
    raw.parse().ok()
}

/// Representative value for one income bin label.
pub fn parse_income(raw: &str) -> Option<f64> {
    INCOME_RULES
        .iter()
        .find(|rule| (rule.matches)(raw))
        .and_then(|rule| (rule.value)(raw))
}

/// Energy burden in percent of income; null unless income is positive.
pub fn energy_burden(bills: Option<f64>, income: Option<f64>) -> Option<f64> {
    match (bills, income) {
        (Some(bills), Some(income)) if income > 0.0 => Some(bills / income * 100.0),
        _ => None,
    }
}

/// Add `in.representative_income` from the income bin midpoint, then the
/// burden column.
pub fn add_income_and_burden(
    mut df: DataFrame,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    if !has_column(&df, INCOME) {
        diagnostics.add_warning_with_column(
            diagnostics::DERIVE,
            "income column absent; representative income and burden not derived",
            INCOME,
        );
        return Ok(df);
    }

    let incomes: Vec<Option<f64>> = column_utf8(&df, INCOME)?
        .into_iter()
        .map(|raw| raw.as_deref().and_then(parse_income))
        .collect();
    df.with_column(Series::new(REPRESENTATIVE_INCOME, incomes))?;
    add_energy_burden(df, diagnostics)
}

/// Burden from whatever `in.representative_income` the frame carries.
pub fn add_energy_burden(
    mut df: DataFrame,
    diagnostics: &mut Diagnostics,
) -> RespubResult<DataFrame> {
    if !has_column(&df, BILLS_ALL_FUELS) {
        diagnostics.add_warning_with_column(
            diagnostics::DERIVE,
            "all-fuels bill column absent; energy burden not derived",
            BILLS_ALL_FUELS,
        );
        return Ok(df);
    }
    let bills = column_f64(&df, BILLS_ALL_FUELS)?;
    let incomes = column_f64(&df, REPRESENTATIVE_INCOME)?;
    let burden: Vec<Option<f64>> = bills
        .into_iter()
        .zip(incomes)
        .map(|(bills, income)| energy_burden(bills, income))
        .collect();
    df.with_column(Series::new(ENERGY_BURDEN, burden))?;
    Ok(df)
}

/// QC: every building with a real income bin must have a representative
/// income. A gap means the income data upstream is incomplete.
pub fn verify_representative_income(df: &DataFrame) -> RespubResult<()> {
    if !has_column(df, INCOME) || !has_column(df, REPRESENTATIVE_INCOME) {
        return Ok(());
    }
    let incomes = column_utf8(df, INCOME)?;
    let representative = column_f64(df, REPRESENTATIVE_INCOME)?;
    let ids = if has_column(df, BLDG_ID) {
        column_i64(df, BLDG_ID)?
    } else {
        vec![None; df.height()]
    };

    let unmapped: Vec<String> = incomes
        .iter()
        .zip(&representative)
        .zip(&ids)
        .filter(|((income, rep), _)| {
            rep.is_none()
                && income
                    .as_deref()
                    .is_some_and(|raw| !raw.is_empty() && raw != INCOME_NOT_AVAILABLE)
        })
        .map(|((income, _), id)| {
            format!(
                "{}:{}",
                id.map_or_else(|| "?".to_string(), |id| id.to_string()),
                income.as_deref().unwrap_or_default()
            )
        })
        .collect();

    if unmapped.is_empty() {
        return Ok(());
    }
    let sample: Vec<&str> = unmapped.iter().take(10).map(String::as_str).collect();
    Err(RespubError::Validation(format!(
        "{REPRESENTATIVE_INCOME} could not be mapped for {} row(s), e.g. {}",
        unmapped.len(),
        sample.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_bin_shape() {
        let below = parse_income("<10000").unwrap();
        assert!(below < 10000.0);
        let range = parse_income("10000-14999").unwrap();
        assert!((10000.0..=14999.0).contains(&range));
        let top = parse_income("200000+").unwrap();
        assert!(top >= 200000.0);
        assert_eq!(parse_income("Not Available"), None);
        assert_eq!(parse_income(""), None);
        assert_eq!(parse_income("52000"), Some(52000.0));
        assert_eq!(parse_income("unknown"), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        // Contains both '-' and '+': the range rule decides.
        assert_eq!(parse_income("100-200+"), Some(150.0));
        // Contains '-' without a range: range rule matches and yields null,
        // the numeric fallback is never consulted.
        assert_eq!(parse_income("-5"), None);
    }

    #[test]
    fn rule_names_are_in_priority_order() {
        let names: Vec<&str> = INCOME_RULES.iter().map(|rule| rule.name).collect();
        assert_eq!(
            names,
            vec!["not-available", "range", "at-least", "below", "numeric"]
        );
    }

    #[test]
    fn burden_requires_positive_income() {
        assert_eq!(energy_burden(Some(1000.0), Some(50000.0)), Some(2.0));
        assert_eq!(energy_burden(Some(1000.0), Some(0.0)), None);
        assert_eq!(energy_burden(Some(1000.0), None), None);
        assert_eq!(energy_burden(None, Some(50000.0)), None);
    }

    #[test]
    fn adds_income_and_burden_columns() {
        let df = df![
            "bldg_id" => &[1i64, 2, 3],
            "in.income" => &["10000-14999", "Not Available", "200000+"],
            "out.bills.all_fuels.usd" => &[1249.95f64, 800.0, 4000.0],
        ]
        .unwrap();
        let mut diag = Diagnostics::new();
        let out = add_income_and_burden(df, &mut diag).unwrap();

        let rep = column_f64(&out, REPRESENTATIVE_INCOME).unwrap();
        assert_eq!(rep, vec![Some(12499.5), None, Some(200000.0)]);
        let burden = column_f64(&out, ENERGY_BURDEN).unwrap();
        assert!((burden[0].unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(burden[1], None);
        assert!((burden[2].unwrap() - 2.0).abs() < 1e-9);
        assert!(!diag.has_issues());
        verify_representative_income(&out).unwrap();
    }

    #[test]
    fn qc_rejects_unmapped_real_income() {
        let df = df![
            "bldg_id" => &[7i64, 8],
            "in.income" => &["garbled", "Not Available"],
        ]
        .unwrap();
        let mut diag = Diagnostics::new();
        let out = add_income_and_burden(df, &mut diag).unwrap();
        let err = verify_representative_income(&out).unwrap_err();
        assert!(matches!(err, RespubError::Validation(_)));
        assert!(err.to_string().contains("7:garbled"));
    }

    #[test]
    fn missing_bill_column_skips_burden_with_warning() {
        let df = df!["in.income" => &["<10000"]].unwrap();
        let mut diag = Diagnostics::new();
        let out = add_income_and_burden(df, &mut diag).unwrap();
        assert!(has_column(&out, REPRESENTATIVE_INCOME));
        assert!(!has_column(&out, ENERGY_BURDEN));
        assert_eq!(diag.warning_count(), 1);
    }
}
