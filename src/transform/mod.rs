//! Type reconciliation and derived columns.
//!
//! Transforming a file:
//!
//! 1. casts every column whose type differs from the [`GlobalSchema`] (non-strict: values that
//!    do not fit become missing)
//! 2. adds `AGE_AS_INT`, `AGE_IS_90_PLUS`, `SITE_GROUP` and `HISTOLOGY_GROUP` when their source
//!    columns are present
//! 3. adds a `<COL>_LABEL` column for every column with a value-label table

pub mod derive;

use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::constants::{LABEL_SUFFIX, is_never_numeric};
use crate::error::NcdbResult;
use crate::execution::ExecutionEngine;
use crate::ingestion::parquet::{read_parquet, rewrite_parquet};
use crate::ingestion::sources::list_parquet_files;
use crate::schema::determine_global_schema_from_files;
use crate::types::{ColumnType, GlobalSchema, ValueLabelMap, ValueLabels};

pub use derive::{age_as_int, age_is_90_plus, histology_group, site_group};

/// Result of transforming a dataset directory in place.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    pub global_schema: GlobalSchema,
    /// Transformed files with their final column count, in path order.
    pub files: Vec<(PathBuf, usize)>,
}

/// Casts and derivations, without label columns.
pub fn transform_lazy(mut lf: LazyFrame, schema: &GlobalSchema) -> NcdbResult<LazyFrame> {
    let current = lf.collect_schema()?;

    let casts: Vec<Expr> = current
        .iter()
        .filter_map(|(name, dtype)| {
            let target = schema.get(name.as_str())?;
            if is_never_numeric(name.as_str()) && target != ColumnType::Utf8 {
                return None;
            }
            let target = target.to_polars();
            (dtype != &target).then(|| col(name.clone()).cast(target))
        })
        .collect();
    if !casts.is_empty() {
        lf = lf.with_columns(casts);
    }

    let derivations = derive::derivations_for(current.iter_names().map(|n| n.as_str()));
    if !derivations.is_empty() {
        lf = lf.with_columns(derivations);
    }

    Ok(lf)
}

/// Full transform of one frame: casts, derivations and label columns.
pub fn transform_frame(
    lf: LazyFrame,
    schema: &GlobalSchema,
    labels: &ValueLabelMap,
) -> NcdbResult<DataFrame> {
    let mut df = transform_lazy(lf, schema)?.collect()?;
    add_label_columns(&mut df, labels)?;
    Ok(df)
}

/// Add `<COL>_LABEL` for every labelled column of `df`. Codes without a label are missing.
pub fn add_label_columns(df: &mut DataFrame, labels: &ValueLabelMap) -> NcdbResult<()> {
    for (name, table) in labels {
        if table.is_empty() || df.column(name).is_err() {
            continue;
        }
        let label_column = label_column(df.column(name)?, name, table)?;
        df.with_column(label_column)?;
    }
    Ok(())
}

fn label_column(source: &Column, name: &str, table: &ValueLabels) -> NcdbResult<Column> {
    let text = source.cast(&DataType::String)?;
    let values: Vec<Option<String>> = text
        .str()?
        .into_iter()
        .map(|code| code.and_then(|c| table.label_for(c)).map(str::to_string))
        .collect();
    Ok(Column::new(format!("{name}{LABEL_SUFFIX}").into(), values))
}

/// Transform a Parquet file in place. Returns the number of columns written.
pub fn transform_file(
    path: impl AsRef<Path>,
    schema: &GlobalSchema,
    labels: &ValueLabelMap,
) -> NcdbResult<usize> {
    let path = path.as_ref();
    let df = read_parquet(path)?;
    let mut out = transform_frame(df.lazy(), schema, labels)?;
    rewrite_parquet(&mut out, path)?;
    Ok(out.width())
}

/// Reconcile and transform every Parquet file in `dir`, one file at a time.
pub fn apply_transformations(
    dir: impl AsRef<Path>,
    labels: &ValueLabelMap,
) -> NcdbResult<TransformReport> {
    apply_transformations_with(dir, labels, &ExecutionEngine::sequential()?)
}

/// [`apply_transformations`] on a caller-provided engine.
pub fn apply_transformations_with(
    dir: impl AsRef<Path>,
    labels: &ValueLabelMap,
    engine: &ExecutionEngine,
) -> NcdbResult<TransformReport> {
    let files = list_parquet_files(dir.as_ref())?;
    let global_schema = determine_global_schema_from_files(&files)?;
    tracing::info!(
        files = files.len(),
        columns = global_schema.len(),
        "applying transformations"
    );

    let widths = engine.run_per_file(&files, |file| transform_file(file, &global_schema, labels))?;
    Ok(TransformReport {
        global_schema,
        files: files.into_iter().zip(widths).collect(),
    })
}
