//! Data dictionary generation.
//!
//! A [`DataDictionary`] describes every column of a built dataset: type, description (from the
//! layout's `LABEL` statements), missing-value counts, distinct values, numeric summaries and the
//! most frequent codes of low-cardinality text columns. Statistics are computed on at most
//! `sample_size` rows, taken after any filters of the query the dictionary is built from.
//!
//! Columns starting with `_` (provenance columns) are skipped.

mod render;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DICTIONARY_BATCH_SIZE, DEFAULT_SAMPLE_SIZE};
use crate::error::{NcdbError, NcdbResult};
use crate::query::{NcdbQuery, scan_path};
use crate::types::{ColumnType, LayoutSpec, ValueLabels};

pub use render::{html_escape, write_csv, write_html, write_json};

/// Text columns with at most this many distinct values get a top-values table.
pub const MAX_CATEGORICAL_VALUES: usize = 20;

/// Number of most frequent values kept per categorical column.
pub const TOP_VALUES: usize = 10;

pub const CSV_FILE_NAME: &str = "data_dictionary.csv";
pub const JSON_FILE_NAME: &str = "data_dictionary.json";
pub const HTML_FILE_NAME: &str = "data_dictionary.html";

/// Output format of a dictionary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryFormat {
    Csv,
    Json,
    Html,
}

impl DictionaryFormat {
    pub const ALL: [Self; 3] = [Self::Csv, Self::Json, Self::Html];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Csv => CSV_FILE_NAME,
            Self::Json => JSON_FILE_NAME,
            Self::Html => HTML_FILE_NAME,
        }
    }
}

/// Options for dictionary generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryOptions {
    /// Compute per-column statistics. When false only name, type and description are filled.
    pub include_stats: bool,
    /// Maximum number of rows statistics are computed on.
    pub sample_size: usize,
    /// Number of columns materialized together.
    pub batch_size: usize,
    pub formats: Vec<DictionaryFormat>,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            include_stats: true,
            sample_size: DEFAULT_SAMPLE_SIZE,
            batch_size: DEFAULT_DICTIONARY_BATCH_SIZE,
            formats: DictionaryFormat::ALL.to_vec(),
        }
    }
}

/// One frequent value of a categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub count: u64,
}

/// Dictionary entry for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub variable: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub description: String,
    pub missing_count: Option<u64>,
    pub missing_pct: Option<f64>,
    pub unique_values: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<TopValue>,
}

impl DictionaryEntry {
    fn bare(variable: &str, dtype: &DataType, description: String) -> Self {
        Self {
            variable: variable.to_string(),
            data_type: ColumnType::from_polars(dtype).to_string(),
            description,
            missing_count: None,
            missing_pct: None,
            unique_values: None,
            min: None,
            max: None,
            mean: None,
            median: None,
            top_values: Vec::new(),
        }
    }

    /// `value (label): count; ...`, the flat rendering used by CSV and HTML.
    pub fn top_values_summary(&self) -> String {
        self.top_values
            .iter()
            .map(|t| match &t.label {
                Some(label) => format!("{} ({label}): {}", t.value, t.count),
                None => format!("{}: {}", t.value, t.count),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Files written by [`DataDictionary::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryPaths {
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

impl DictionaryPaths {
    /// First written file, preferring CSV.
    pub fn primary(&self) -> Option<&Path> {
        self.csv
            .as_deref()
            .or(self.json.as_deref())
            .or(self.html.as_deref())
    }
}

/// Column documentation for a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataDictionary {
    pub entries: Vec<DictionaryEntry>,
}

impl DataDictionary {
    /// Describe the Parquet file or directory at `path`.
    ///
    /// `layout` supplies descriptions and value labels; without it descriptions are empty.
    pub fn from_path(
        path: impl AsRef<Path>,
        layout: Option<&LayoutSpec>,
        opts: &DictionaryOptions,
    ) -> NcdbResult<Self> {
        Self::from_lazy(scan_path(path.as_ref())?, layout, opts)
    }

    /// Describe the result of a query. Statistics use the filtered rows.
    pub fn from_query(
        query: &NcdbQuery,
        layout: Option<&LayoutSpec>,
        opts: &DictionaryOptions,
    ) -> NcdbResult<Self> {
        Self::from_lazy(query.lazy_frame().clone(), layout, opts)
    }

    pub fn from_lazy(
        mut lf: LazyFrame,
        layout: Option<&LayoutSpec>,
        opts: &DictionaryOptions,
    ) -> NcdbResult<Self> {
        if opts.batch_size == 0 {
            return Err(NcdbError::validation("dictionary batch_size must be > 0"));
        }

        let schema = lf.collect_schema()?;
        let columns: Vec<(String, DataType)> = schema
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, dtype)| (name.to_string(), dtype.clone()))
            .collect();

        let descriptions = layout.map(|l| &l.variable_labels);
        let value_labels = layout.map(|l| &l.value_labels);

        let mut entries = Vec::with_capacity(columns.len());
        for batch in columns.chunks(opts.batch_size) {
            let sample = if opts.include_stats {
                let exprs: Vec<Expr> = batch.iter().map(|(name, _)| col(name.as_str())).collect();
                Some(
                    lf.clone()
                        .select(exprs)
                        .limit(opts.sample_size as IdxSize)
                        .collect()?,
                )
            } else {
                None
            };

            for (name, dtype) in batch {
                let description = descriptions
                    .and_then(|d| d.get(name))
                    .cloned()
                    .unwrap_or_default();
                let mut entry = DictionaryEntry::bare(name, dtype, description);
                if let Some(sample) = &sample {
                    let labels = value_labels.and_then(|v| v.get(name));
                    fill_statistics(&mut entry, sample.column(name)?, labels)?;
                }
                entries.push(entry);
            }
        }

        tracing::debug!(columns = entries.len(), "data dictionary built");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, variable: &str) -> Option<&DictionaryEntry> {
        self.entries.iter().find(|e| e.variable == variable)
    }

    /// Write the requested formats into `dir` (created if needed).
    pub fn write(&self, dir: impl AsRef<Path>, formats: &[DictionaryFormat]) -> NcdbResult<DictionaryPaths> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut paths = DictionaryPaths::default();
        for format in formats {
            let path = dir.join(format.file_name());
            match format {
                DictionaryFormat::Csv => {
                    write_csv(self, &path)?;
                    paths.csv = Some(path);
                }
                DictionaryFormat::Json => {
                    write_json(self, &path)?;
                    paths.json = Some(path);
                }
                DictionaryFormat::Html => {
                    write_html(self, &path)?;
                    paths.html = Some(path);
                }
            }
        }
        Ok(paths)
    }
}

/// Build a dictionary for `dataset` and write it.
///
/// `output_dir` defaults to the dataset directory (or the file's parent directory).
pub fn generate_data_dictionary(
    dataset: impl AsRef<Path>,
    output_dir: Option<&Path>,
    layout: Option<&LayoutSpec>,
    opts: &DictionaryOptions,
) -> NcdbResult<DictionaryPaths> {
    let dataset = dataset.as_ref();
    if !dataset.exists() {
        return Err(NcdbError::validation(format!(
            "dataset not found: {}",
            dataset.display()
        )));
    }
    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None if dataset.is_file() => dataset
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        None => dataset.to_path_buf(),
    };

    let dictionary = DataDictionary::from_path(dataset, layout, opts)?;
    dictionary.write(&output_dir, &opts.formats)
}

fn fill_statistics(
    entry: &mut DictionaryEntry,
    column: &Column,
    labels: Option<&ValueLabels>,
) -> NcdbResult<()> {
    let rows = column.len();
    let missing = column.null_count();
    let unique = column.as_materialized_series().n_unique()?;

    entry.missing_count = Some(missing as u64);
    entry.missing_pct = Some(if rows > 0 {
        round2(missing as f64 * 100.0 / rows as f64)
    } else {
        0.0
    });
    entry.unique_values = Some(unique as u64);

    let dtype = column.dtype();
    if dtype == &DataType::String && unique <= MAX_CATEGORICAL_VALUES {
        entry.top_values = top_values(column.str()?, labels);
    } else if dtype.is_primitive_numeric() {
        let values = column.cast(&DataType::Float64)?;
        let values = values.f64()?;
        entry.min = values.min();
        entry.max = values.max();
        entry.mean = values.mean().map(round2);
        entry.median = values.median();
    }
    Ok(())
}

fn top_values(values: &StringChunked, labels: Option<&ValueLabels>) -> Vec<TopValue> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for value in values.into_iter().flatten() {
        *counts.entry(value).or_default() += 1;
    }

    let mut counts: Vec<(&str, u64)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts
        .into_iter()
        .take(TOP_VALUES)
        .map(|(value, count)| TopValue {
            value: value.to_string(),
            label: labels
                .and_then(|l| l.label_for(value))
                .map(str::to_string),
            count,
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
