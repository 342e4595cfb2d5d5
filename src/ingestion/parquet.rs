//! Parquet read/write helpers shared by the build stages.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::NcdbResult;

/// Write `df` to `path` with Snappy compression. Returns the written size in bytes.
pub fn write_parquet(df: &mut DataFrame, path: impl AsRef<Path>) -> NcdbResult<u64> {
    let file = File::create(path.as_ref())?;
    let size = ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)?;
    Ok(size)
}

/// Replace `path` with `df`, going through a sibling temporary file so a failed write never
/// leaves a truncated dataset file behind.
pub fn rewrite_parquet(df: &mut DataFrame, path: impl AsRef<Path>) -> NcdbResult<u64> {
    let path = path.as_ref();
    let tmp = temporary_sibling(path);
    let size = match write_parquet(df, &tmp) {
        Ok(size) => size,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };
    fs::rename(&tmp, path)?;
    Ok(size)
}

/// Read a whole Parquet file into memory.
pub fn read_parquet(path: impl AsRef<Path>) -> NcdbResult<DataFrame> {
    let file = File::open(path.as_ref())?;
    Ok(ParquetReader::new(file).finish()?)
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
