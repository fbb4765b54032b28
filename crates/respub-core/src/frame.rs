//! Small DataFrame helpers shared by the pipeline stages.

use polars::prelude::*;

use crate::error::RespubResult;

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Column names of a lazy plan, resolved from its schema without collecting.
pub fn schema_names(lf: &LazyFrame) -> RespubResult<Vec<String>> {
    Ok(lf.schema()?.iter_names().map(|name| name.to_string()).collect())
}

pub fn has_column(df: &DataFrame, column: &str) -> bool {
    df.get_column_names().iter().any(|name| *name == column)
}

/// Column values as owned strings; non-string columns are cast first.
pub fn column_utf8(df: &DataFrame, column: &str) -> RespubResult<Vec<Option<String>>> {
    let series = df.column(column)?.cast(&DataType::Utf8)?;
    let chunked = series.utf8()?;
    Ok(chunked
        .into_iter()
        .map(|opt| opt.map(|value| value.to_string()))
        .collect())
}

/// Column values as floats; values that fail the cast become null.
pub fn column_f64(df: &DataFrame, column: &str) -> RespubResult<Vec<Option<f64>>> {
    let series = df.column(column)?.cast(&DataType::Float64)?;
    let chunked = series.f64()?;
    Ok(chunked.into_iter().collect())
}

pub fn column_i64(df: &DataFrame, column: &str) -> RespubResult<Vec<Option<i64>>> {
    let series = df.column(column)?.cast(&DataType::Int64)?;
    let chunked = series.i64()?;
    Ok(chunked.into_iter().collect())
}

/// Keep the rows whose flag is `true`.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> RespubResult<DataFrame> {
    let mask = BooleanChunked::from_slice("mask", keep);
    Ok(df.filter(&mask)?)
}

pub fn sort_by(df: DataFrame, column: &str) -> RespubResult<DataFrame> {
    Ok(df.lazy().sort(column, SortOptions::default()).collect()?)
}

/// Stack two frames whose column sets may differ.
///
/// Columns missing on one side are filled with nulls; columns whose types
/// disagree are cast to their supertype. Column order is `top`'s, followed
/// by columns only `bottom` has.
pub fn concat_relaxed(top: &DataFrame, bottom: &DataFrame) -> RespubResult<DataFrame> {
    let args = UnionArgs {
        to_supertypes: true,
        ..Default::default()
    };
    Ok(concat_lf_diagonal([top.clone().lazy(), bottom.clone().lazy()], args)?.collect()?)
}
