use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type used across the crate.
pub type NcdbResult<T> = Result<T, NcdbError>;

/// Error type returned by layout parsing, ingestion, transforms and queries.
///
/// Malformed data lines and unparseable cell values are not errors:
/// lines with the wrong record length are skipped and counted, and failed casts become missing
/// values.
#[derive(Debug, Error)]
pub enum NcdbError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or missing paths, wrong extensions, malformed memory limits.
    ///
    /// Raised before any work begins.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The layout specification is missing or cannot be parsed.
    #[error("layout error in {}: {message}", path.as_ref().map_or_else(|| "<inline>".to_string(), |p| p.display().to_string()))]
    Format {
        path: Option<PathBuf>,
        message: String,
    },

    /// A named query filter targets a column that is not part of the dataset schema.
    #[error("column '{column}' required by {operation} is not present in the dataset")]
    MissingColumn { column: String, operation: String },

    /// Polars (dataframe / lazy engine) error.
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Parquet footer/metadata error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// CSV read/write error (column override file, dictionary output).
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error (summary, dictionary output).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The per-file worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl NcdbError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn format(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path,
            message: message.into(),
        }
    }
}
