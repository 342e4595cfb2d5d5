//! Environment-driven configuration.
//!
//! Library code never reads the environment implicitly; callers opt in with
//! [`EnvConfig::from_env`] and feed the values into [`crate::builder::BuildOptions`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::constants::{DATA_FILE_EXTENSION, DEFAULT_MEMORY_LIMIT, PARQUET_EXTENSION};
use crate::error::NcdbResult;
use crate::validation::MemoryLimit;

pub const DATA_DIR_VAR: &str = "NCDB_DATA_DIR";
pub const OUTPUT_DIR_VAR: &str = "NCDB_OUTPUT_DIR";
pub const MEMORY_LIMIT_VAR: &str = "NCDB_MEMORY_LIMIT";

/// Values read from `NCDB_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Directory containing `.dat` or `.parquet` inputs.
    pub data_dir: Option<PathBuf>,
    /// Where builds write their output. See [`default_output_dir`] for the fallback.
    pub output_dir: Option<PathBuf>,
    /// Raw memory limit string, validated by [`EnvConfig::memory_limit_bytes`].
    pub memory_limit: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            output_dir: None,
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            data_dir: get(DATA_DIR_VAR).map(PathBuf::from),
            output_dir: get(OUTPUT_DIR_VAR).map(PathBuf::from),
            memory_limit: get(MEMORY_LIMIT_VAR).unwrap_or_else(|| DEFAULT_MEMORY_LIMIT.to_string()),
        }
    }

    pub fn memory_limit_bytes(&self) -> NcdbResult<u64> {
        Ok(MemoryLimit::parse(&self.memory_limit)?.bytes())
    }

    /// Output directory, falling back to a dated directory under `data_dir`.
    pub fn resolve_output_dir(&self, data_dir: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| default_output_dir(data_dir, Local::now().date_naive()))
    }
}

/// `<data_dir>/ncdb_parquet_<YYYYMMDD>`.
pub fn default_output_dir(data_dir: &Path, date: NaiveDate) -> PathBuf {
    data_dir.join(format!("ncdb_parquet_{}", date.format("%Y%m%d")))
}

/// True when `data_dir` exists and holds `.dat` or `.parquet` files with NCDB-like names.
pub fn validate_data_directory(data_dir: &Path) -> bool {
    const NAME_HINTS: [&str; 4] = ["ncdb", "ncdbpuf", "puf", "cancer"];

    let Ok(entries) = fs::read_dir(data_dir) else {
        return false;
    };

    entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    e.eq_ignore_ascii_case(DATA_FILE_EXTENSION) || e.eq_ignore_ascii_case(PARQUET_EXTENSION)
                })
        })
        .any(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            NAME_HINTS.iter().any(|hint| name.contains(hint))
        })
}
