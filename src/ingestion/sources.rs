//! Input discovery: which files in a data directory feed a build.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{DATA_FILE_EXTENSION, PARQUET_EXTENSION};
use crate::error::{NcdbError, NcdbResult};

/// Formats a build can start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Fixed-width PUF text (`.dat`).
    FixedWidth,
    /// Parquet files from an earlier build (`.parquet`).
    Parquet,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dat" => Some(Self::FixedWidth),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::FixedWidth => DATA_FILE_EXTENSION,
            Self::Parquet => PARQUET_EXTENSION,
        }
    }
}

/// The inputs found in a data directory.
///
/// `.dat` files take precedence: Parquet files are only used when no `.dat` file is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    pub format: SourceFormat,
    pub files: Vec<PathBuf>,
}

impl SourceSet {
    pub fn discover(data_dir: &Path) -> NcdbResult<Self> {
        let data_files = list_files(data_dir, SourceFormat::FixedWidth)?;
        if !data_files.is_empty() {
            return Ok(Self {
                format: SourceFormat::FixedWidth,
                files: data_files,
            });
        }

        let parquet_files = list_files(data_dir, SourceFormat::Parquet)?;
        if !parquet_files.is_empty() {
            return Ok(Self {
                format: SourceFormat::Parquet,
                files: parquet_files,
            });
        }

        Err(NcdbError::validation(format!(
            "no NCDB data files (.dat) or parquet files found in {}",
            data_dir.display()
        )))
    }
}

/// Files in `dir` (not recursive) with the extension of `format`, sorted by path.
pub fn list_files(dir: &Path, format: SourceFormat) -> NcdbResult<Vec<PathBuf>> {
    let pattern = dir.join(format!("*.{}", format.extension()));
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| NcdbError::validation(format!("invalid search pattern {pattern}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(glob::GlobError::into_error)?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn list_parquet_files(dir: &Path) -> NcdbResult<Vec<PathBuf>> {
    list_files(dir, SourceFormat::Parquet)
}

/// Dataset family recognised from file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetType {
    Ncdb,
    Unknown,
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ncdb => "ncdb",
            Self::Unknown => "unknown",
        })
    }
}

/// `Ncdb` when any file in `data_dir` has an NCDB-like name.
pub fn detect_dataset_type(data_dir: &Path) -> DatasetType {
    const PATTERNS: [&str; 3] = ["ncdbpuf", "ncdb_puf", "cancer"];

    let Ok(entries) = std::fs::read_dir(data_dir) else {
        return DatasetType::Unknown;
    };
    let found = entries.filter_map(Result::ok).any(|e| {
        let name = e.file_name().to_string_lossy().to_ascii_lowercase();
        PATTERNS.iter().any(|p| name.contains(p))
    });

    if found {
        DatasetType::Ncdb
    } else {
        DatasetType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("DAT"), Some(SourceFormat::FixedWidth));
        assert_eq!(SourceFormat::from_extension("pq"), Some(SourceFormat::Parquet));
        assert_eq!(SourceFormat::from_extension("csv"), None);
    }

    #[test]
    fn dataset_type_displays_lowercase() {
        assert_eq!(DatasetType::Ncdb.to_string(), "ncdb");
        assert_eq!(
            detect_dataset_type(Path::new("/definitely/not/a/dir")),
            DatasetType::Unknown
        );
    }
}
