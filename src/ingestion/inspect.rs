//! Parquet footer inspection.
//!
//! Schemas and row counts are read from file metadata with the `parquet` crate; no row data is
//! loaded.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use parquet::basic::Type as PhysicalType;
use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NcdbError, NcdbResult};
use crate::types::{ColumnType, FileSchema};

use super::sources::list_parquet_files;

/// Footer summary of one Parquet file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file: String,
    pub rows: u64,
    pub columns: usize,
    pub size_mb: f64,
}

/// Verification summary of a Parquet dataset directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Files whose footer was read.
    pub total_files: usize,
    /// Files whose footer could not be read.
    #[serde(default)]
    pub skipped_files: usize,
    pub total_rows: u64,
    pub file_details: Vec<FileInfo>,
    /// Number of columns present in every file.
    pub common_columns: usize,
    /// Names of the columns present in every file, sorted.
    pub column_names: Vec<String>,
    /// True when every file has the same columns with the same types.
    pub schemas_consistent: bool,
}

/// Column schema of a Parquet file, from its footer.
pub fn read_file_schema(path: impl AsRef<Path>) -> NcdbResult<FileSchema> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;
    Ok(schema_from_reader(&reader))
}

/// Row count of a Parquet file, from its footer.
pub fn parquet_row_count(path: impl AsRef<Path>) -> NcdbResult<u64> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;
    Ok(reader.metadata().file_metadata().num_rows().max(0) as u64)
}

fn schema_from_reader<R: ChunkReader + 'static>(reader: &SerializedFileReader<R>) -> FileSchema {
    let columns = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), column_type_of(c.physical_type())))
        .collect();
    FileSchema::new(columns)
}

fn column_type_of(physical: PhysicalType) -> ColumnType {
    match physical {
        PhysicalType::BOOLEAN => ColumnType::Bool,
        PhysicalType::INT32 | PhysicalType::INT64 => ColumnType::Int64,
        PhysicalType::FLOAT | PhysicalType::DOUBLE => ColumnType::Float64,
        PhysicalType::INT96 | PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => {
            ColumnType::Utf8
        }
    }
}

/// Inspect every Parquet file in `dir`.
///
/// Files whose footer cannot be read are logged, counted in `skipped_files` and left out of the
/// totals.
pub fn inspect_parquet_files(dir: impl AsRef<Path>) -> NcdbResult<DatasetInfo> {
    let dir = dir.as_ref();
    let files = list_parquet_files(dir)?;
    if files.is_empty() {
        return Err(NcdbError::validation(format!(
            "no parquet files found in {}",
            dir.display()
        )));
    }

    let mut file_details = Vec::with_capacity(files.len());
    let mut schemas: Vec<FileSchema> = Vec::with_capacity(files.len());
    let mut total_rows = 0u64;
    let mut skipped_files = 0usize;

    for path in &files {
        let inspected = SerializedFileReader::try_from(path.as_path()).map(|reader| {
            let rows = reader.metadata().file_metadata().num_rows().max(0) as u64;
            (rows, schema_from_reader(&reader))
        });
        let (rows, schema) = match inspected {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "could not inspect parquet file");
                skipped_files += 1;
                continue;
            }
        };

        let size_mb = fs::metadata(path).map(|m| m.len()).unwrap_or(0) as f64 / (1024.0 * 1024.0);
        file_details.push(FileInfo {
            file: file_name(path),
            rows,
            columns: schema.columns.len(),
            size_mb,
        });
        total_rows += rows;
        schemas.push(schema);
    }

    let common = common_columns(&schemas);
    let schemas_consistent = schemas.windows(2).all(|w| w[0] == w[1]);

    Ok(DatasetInfo {
        total_files: file_details.len(),
        skipped_files,
        total_rows,
        file_details,
        common_columns: common.len(),
        column_names: common.into_iter().collect(),
        schemas_consistent,
    })
}

/// Column names present in every schema.
pub fn common_columns(schemas: &[FileSchema]) -> BTreeSet<String> {
    let mut iter = schemas.iter();
    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };
    let mut common: BTreeSet<String> = first.columns.iter().map(|(n, _)| n.clone()).collect();
    for schema in iter {
        let names: BTreeSet<&str> = schema.columns.iter().map(|(n, _)| n.as_str()).collect();
        common.retain(|n| names.contains(n.as_str()));
    }
    common
}

/// Missing-value statistics of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullStatistics {
    pub null_count: u64,
    pub null_percentage: f64,
    pub data_type: String,
}

/// Row count plus per-column missing-value statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub total_rows: u64,
    pub columns: Vec<(String, NullStatistics)>,
}

/// Missing-value statistics for a Parquet file or directory, optionally limited to `columns`.
pub fn get_column_statistics(
    path: impl AsRef<Path>,
    columns: Option<&[&str]>,
) -> NcdbResult<ColumnStatistics> {
    let mut lf = crate::query::scan_path(path.as_ref())?;
    if let Some(columns) = columns {
        lf = lf.select(columns.iter().map(|c| col(*c)).collect::<Vec<_>>());
    }

    let schema = lf.collect_schema()?;
    let total_rows = lf
        .clone()
        .select([len().cast(DataType::UInt64).alias("len")])
        .collect()?
        .column("len")?
        .u64()?
        .get(0)
        .unwrap_or(0);
    let null_counts = lf.null_count().collect()?;

    let mut out = Vec::with_capacity(schema.len());
    for (name, dtype) in schema.iter() {
        let null_count = null_counts
            .column(name.as_str())?
            .cast(&DataType::UInt64)?
            .u64()?
            .get(0)
            .unwrap_or(0);
        let null_percentage = if total_rows > 0 {
            null_count as f64 / total_rows as f64 * 100.0
        } else {
            0.0
        };
        out.push((
            name.to_string(),
            NullStatistics {
                null_count,
                null_percentage,
                data_type: dtype.to_string(),
            },
        ));
    }

    Ok(ColumnStatistics {
        total_rows,
        columns: out,
    })
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(cols: &[&str]) -> FileSchema {
        FileSchema::new(cols.iter().map(|c| (c.to_string(), ColumnType::Utf8)).collect())
    }

    #[test]
    fn common_columns_is_the_intersection() {
        let common = common_columns(&[schema(&["A", "B", "C"]), schema(&["C", "A"])]);
        assert_eq!(common.into_iter().collect::<Vec<_>>(), vec!["A", "C"]);
        assert!(common_columns(&[]).is_empty());
    }

    #[test]
    fn unreadable_files_are_counted_as_skipped() {
        let dir = std::env::temp_dir().join(format!("ncdb-inspect-skip-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut df = df!["AGE" => ["45", "60"]].unwrap();
        crate::ingestion::parquet::write_parquet(&mut df, dir.join("good.parquet")).unwrap();
        fs::write(dir.join("bad.parquet"), b"not parquet").unwrap();

        let info = inspect_parquet_files(&dir).unwrap();
        assert_eq!(info.total_files, 1);
        assert_eq!(info.skipped_files, 1);
        assert_eq!(info.total_rows, 2);
        assert_eq!(info.file_details.len(), 1);
        assert_eq!(info.file_details[0].file, "good.parquet");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn physical_types_map_to_column_types() {
        assert_eq!(column_type_of(PhysicalType::INT32), ColumnType::Int64);
        assert_eq!(column_type_of(PhysicalType::DOUBLE), ColumnType::Float64);
        assert_eq!(column_type_of(PhysicalType::BYTE_ARRAY), ColumnType::Utf8);
        assert_eq!(column_type_of(PhysicalType::BOOLEAN), ColumnType::Bool);
    }
}
