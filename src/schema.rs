//! Cross-file schema reconciliation.
//!
//! Each decoded file gets its own naively inferred types. Before the files are combined, one
//! [`GlobalSchema`] is chosen so that every column has the same type in every file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::is_never_numeric;
use crate::error::NcdbResult;
use crate::ingestion::inspect::read_file_schema;
use crate::types::{ColumnType, FileSchema, GlobalSchema};

/// Pick one type per column across `schemas`.
///
/// - identical types are kept
/// - conflicts resolve to the most general type, `Utf8` > `Float64` > `Int64`
/// - `Bool` in conflict with anything else becomes `Utf8`
/// - never-numeric columns are always `Utf8`
pub fn determine_global_schema(schemas: &[FileSchema]) -> GlobalSchema {
    let mut seen: BTreeMap<String, Vec<ColumnType>> = BTreeMap::new();
    for schema in schemas {
        for (name, ty) in &schema.columns {
            seen.entry(name.clone()).or_default().push(*ty);
        }
    }

    let columns = seen
        .into_iter()
        .map(|(name, types)| {
            let resolved = if is_never_numeric(&name) {
                ColumnType::Utf8
            } else {
                resolve_column_type(&types)
            };
            (name, resolved)
        })
        .collect();

    GlobalSchema { columns }
}

/// Reconcile the footer schemas of Parquet files.
pub fn determine_global_schema_from_files(files: &[PathBuf]) -> NcdbResult<GlobalSchema> {
    let schemas = files
        .iter()
        .map(read_file_schema)
        .collect::<NcdbResult<Vec<_>>>()?;
    let global = determine_global_schema(&schemas);
    tracing::debug!(files = files.len(), columns = global.len(), "global schema determined");
    Ok(global)
}

/// Resolve the observed types of a single column.
pub fn resolve_column_type(types: &[ColumnType]) -> ColumnType {
    let Some(first) = types.first() else {
        return ColumnType::Utf8;
    };
    if types.iter().all(|t| t == first) {
        return *first;
    }

    if types
        .iter()
        .any(|t| matches!(t, ColumnType::Utf8 | ColumnType::Bool))
    {
        ColumnType::Utf8
    } else if types.contains(&ColumnType::Float64) {
        ColumnType::Float64
    } else {
        ColumnType::Int64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ColumnType::*;

    fn file(cols: &[(&str, ColumnType)]) -> FileSchema {
        FileSchema::new(cols.iter().map(|(n, t)| (n.to_string(), *t)).collect())
    }

    #[test]
    fn consistent_types_are_kept() {
        let g = determine_global_schema(&[file(&[("AGE", Int64)]), file(&[("AGE", Int64)])]);
        assert_eq!(g.get("AGE"), Some(Int64));
    }

    #[test]
    fn conflicts_widen_to_most_general() {
        assert_eq!(resolve_column_type(&[Int64, Utf8]), Utf8);
        assert_eq!(resolve_column_type(&[Int64, Float64]), Float64);
        assert_eq!(resolve_column_type(&[Float64, Int64, Utf8]), Utf8);
        assert_eq!(resolve_column_type(&[Bool, Int64]), Utf8);
        assert_eq!(resolve_column_type(&[Bool, Bool]), Bool);
        assert_eq!(resolve_column_type(&[]), Utf8);
    }

    #[test]
    fn never_numeric_columns_resolve_to_text() {
        let g = determine_global_schema(&[
            file(&[("YEAR_OF_DIAGNOSIS", Int64), ("CROWFLY", Float64)]),
            file(&[("YEAR_OF_DIAGNOSIS", Int64)]),
        ]);
        assert_eq!(g.get("YEAR_OF_DIAGNOSIS"), Some(Utf8));
        assert_eq!(g.get("CROWFLY"), Some(Float64));
    }

    #[test]
    fn union_of_columns() {
        let g = determine_global_schema(&[file(&[("A", Int64)]), file(&[("B", Utf8)])]);
        assert_eq!(g.len(), 2);
    }
}
