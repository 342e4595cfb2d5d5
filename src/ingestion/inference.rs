//! Per-file type inference over freshly decoded string columns.

use polars::prelude::*;

use crate::constants::is_never_numeric;
use crate::error::NcdbResult;
use crate::types::{ColumnType, FileSchema};

/// Infer a column type from its non-missing values.
///
/// All values parse as `i64` → `Int64`; else all parse as `f64` → `Float64`; otherwise (or when
/// every value is missing) `Utf8`.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut all_int = true;
    let mut any = false;

    for v in values.into_iter().flatten() {
        any = true;
        if all_int && v.parse::<i64>().is_ok() {
            continue;
        }
        all_int = false;
        if !is_float_literal(v) {
            return ColumnType::Utf8;
        }
    }

    match (any, all_int) {
        (false, _) => ColumnType::Utf8,
        (true, true) => ColumnType::Int64,
        (true, false) => ColumnType::Float64,
    }
}

/// `f64` parsing also accepts `inf`/`NaN`; registry codes never spell numbers that way.
fn is_float_literal(v: &str) -> bool {
    v.bytes().any(|b| b.is_ascii_digit()) && v.parse::<f64>().is_ok()
}

/// Infer the schema of a string-typed frame. Never-numeric and non-string columns keep
/// their current type.
pub fn infer_file_schema(df: &DataFrame) -> NcdbResult<FileSchema> {
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = column.name().as_str();
        let ty = if is_never_numeric(name) || !matches!(column.dtype(), DataType::String) {
            ColumnType::from_polars(column.dtype())
        } else {
            infer_column_type(column.str()?)
        };
        columns.push((name.to_string(), ty));
    }
    Ok(FileSchema::new(columns))
}

/// Infer types and cast the frame to them. Casting is non-strict; values that do not fit become
/// missing.
pub fn apply_inferred_types(df: DataFrame) -> NcdbResult<(DataFrame, FileSchema)> {
    let schema = infer_file_schema(&df)?;
    let casts: Vec<Expr> = schema
        .columns
        .iter()
        .filter(|(_, ty)| ty.is_numeric())
        .map(|(name, ty)| col(name.as_str()).cast(ty.to_polars()))
        .collect();

    if casts.is_empty() {
        return Ok((df, schema));
    }
    let typed = df.lazy().with_columns(casts).collect()?;
    Ok((typed, schema))
}
