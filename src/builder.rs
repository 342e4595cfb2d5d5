//! Dataset builds: fixed-width files (or an earlier Parquet build) in, reconciled Parquet out.
//!
//! [`build_parquet_dataset`] runs the whole pipeline over a data directory:
//!
//! 1. validate inputs (data directory, layout, column override, memory limit)
//! 2. decode every `.dat` file to `<stem>.parquet`, or copy existing Parquet files
//! 3. reconcile column types across files and apply the standard transforms
//! 4. verify the written files from their footers
//! 5. write the data dictionary and `dataset_summary.json`
//!
//! Progress is reported as [`BuildEvent`]s to `build.log` in the output directory and to the
//! caller's observer, if any.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ncdb_tools::builder::{build_parquet_dataset, BuildOptions};
//! use ncdb_tools::ingestion::StdErrObserver;
//!
//! # fn main() -> Result<(), ncdb_tools::NcdbError> {
//! let opts = BuildOptions {
//!     num_threads: 4,
//!     observer: Some(Arc::new(StdErrObserver)),
//!     ..Default::default()
//! };
//! let outcome = build_parquet_dataset("/data/ncdb", &opts)?;
//! println!("dataset at {}", outcome.parquet_dir.display());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{EnvConfig, default_output_dir};
use crate::constants::{
    COLUMNS_FILE_EXTENSION, DATA_FILE_EXTENSION, DEFAULT_BATCH_SIZE, DEFAULT_MEMORY_LIMIT,
    LAYOUT_FILE_EXTENSION, NCDB_RECORD_LENGTH, PARQUET_EXTENSION, SOURCE_FILE_COLUMN,
    TUMOR_TYPE_COLUMN,
};
use crate::dictionary::{DataDictionary, DictionaryOptions, DictionaryPaths};
use crate::error::{NcdbError, NcdbResult};
use crate::execution::{ExecutionEngine, ExecutionOptions};
use crate::ingestion::fixed_width::{FixedWidthReader, tumor_type_from_file_name};
use crate::ingestion::inference::apply_inferred_types;
use crate::ingestion::inspect::{DatasetInfo, file_name, inspect_parquet_files};
use crate::ingestion::observability::{
    BuildEvent, BuildObserver, BuildSeverity, CompositeObserver, FileObserver,
};
use crate::ingestion::parquet::write_parquet;
use crate::ingestion::sources::{SourceFormat, SourceSet};
use crate::layout::load_layout;
use crate::transform::apply_transformations_with;
use crate::types::{LayoutSpec, ValueLabelMap};
use crate::validation::{MemoryLimit, sanitize_path_for_logging, validate_directory, validate_path};

pub use crate::ingestion::sources::{DatasetType, detect_dataset_type};

pub const BUILD_LOG_FILE_NAME: &str = "build.log";
pub const SUMMARY_FILE_NAME: &str = "dataset_summary.json";

/// Options for [`build_parquet_dataset`].
///
/// Use [`Default`] for common cases, or [`BuildOptions::from_env_config`] to start from
/// `NCDB_*` environment variables.
#[derive(Clone)]
pub struct BuildOptions {
    /// Output directory. `None` means `<data_dir>/ncdb_parquet_<YYYYMMDD>`.
    pub output_dir: Option<PathBuf>,
    /// SAS layout file. `None` means the first `.sas` file (by name) in the data directory.
    pub layout: Option<PathBuf>,
    /// Optional `name,start,end` CSV replacing the layout's field positions.
    pub columns_override: Option<PathBuf>,
    /// Memory limit such as `"4GB"`; validated and recorded in the summary.
    pub memory_limit: String,
    pub generate_dictionary: bool,
    pub apply_transforms: bool,
    pub verify_files: bool,
    /// Files processed concurrently. Must be at least 1.
    pub num_threads: usize,
    pub record_length: usize,
    /// Records per decode batch.
    pub batch_size: usize,
    pub dictionary: DictionaryOptions,
    /// Optional observer for logging/alerts, in addition to `build.log`.
    pub observer: Option<Arc<dyn BuildObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: BuildSeverity,
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("output_dir", &self.output_dir)
            .field("layout", &self.layout)
            .field("columns_override", &self.columns_override)
            .field("memory_limit", &self.memory_limit)
            .field("generate_dictionary", &self.generate_dictionary)
            .field("apply_transforms", &self.apply_transforms)
            .field("verify_files", &self.verify_files)
            .field("num_threads", &self.num_threads)
            .field("record_length", &self.record_length)
            .field("batch_size", &self.batch_size)
            .field("dictionary", &self.dictionary)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            layout: None,
            columns_override: None,
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
            generate_dictionary: true,
            apply_transforms: true,
            verify_files: true,
            num_threads: 1,
            record_length: NCDB_RECORD_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
            dictionary: DictionaryOptions::default(),
            observer: None,
            alert_at_or_above: BuildSeverity::Error,
        }
    }
}

impl BuildOptions {
    /// Defaults with the output directory and memory limit taken from `config`.
    pub fn from_env_config(config: &EnvConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            memory_limit: config.memory_limit.clone(),
            ..Self::default()
        }
    }
}

/// Result of decoding one fixed-width file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBuildReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
    pub skipped_lines: usize,
    pub tumor_type: String,
}

/// Paths and verification results of a finished build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub parquet_dir: PathBuf,
    pub dictionary: Option<DictionaryPaths>,
    pub log: PathBuf,
    pub summary: PathBuf,
    pub dataset_info: Option<DatasetInfo>,
    /// Per-file decode results; empty when the build started from Parquet files.
    pub files: Vec<FileBuildReport>,
}

/// Contents of `dataset_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// RFC 3339, local time.
    pub build_timestamp: String,
    pub data_directory: PathBuf,
    pub output_directory: PathBuf,
    pub memory_limit: String,
    pub memory_limit_bytes: u64,
    pub dataset_type: String,
    pub files: Vec<FileBuildReport>,
    pub dataset_info: Option<DatasetInfo>,
}

/// Decode one fixed-width file into `<output_dir>/<stem>.parquet`.
///
/// Validates that `data_file` is an existing `.dat` file, `layout_file` an existing `.sas` file
/// and `columns_override` (if any) an existing `.csv` file.
pub fn build_dataset(
    data_file: impl AsRef<Path>,
    layout_file: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    columns_override: Option<&Path>,
) -> NcdbResult<FileBuildReport> {
    let data_file = validate_path(data_file, true, &[DATA_FILE_EXTENSION], "data file")?;
    let layout_file = validate_path(layout_file, true, &[LAYOUT_FILE_EXTENSION], "layout file")?;
    let columns_override = columns_override
        .map(|p| validate_path(p, true, &[COLUMNS_FILE_EXTENSION], "column override file"))
        .transpose()?;
    let output_dir = validate_directory(output_dir, false, true, "output directory")?;

    let layout = load_layout(&layout_file, columns_override.as_deref(), NCDB_RECORD_LENGTH)?;
    decode_to_parquet(
        &data_file,
        &layout,
        &output_dir,
        NCDB_RECORD_LENGTH,
        DEFAULT_BATCH_SIZE,
    )
}

/// Decode, infer types, add provenance columns and write Parquet.
fn decode_to_parquet(
    data_file: &Path,
    layout: &LayoutSpec,
    output_dir: &Path,
    record_length: usize,
    batch_size: usize,
) -> NcdbResult<FileBuildReport> {
    let source_name = file_name(data_file);
    let tumor_type = tumor_type_from_file_name(&source_name);

    let (raw, stats) = FixedWidthReader::new(&layout.fields)
        .with_record_length(record_length)
        .with_batch_size(batch_size)
        .read_path(data_file)?;
    let (mut df, _) = apply_inferred_types(raw)?;

    let height = df.height();
    df.with_column(Column::new(
        TUMOR_TYPE_COLUMN.into(),
        vec![tumor_type.as_str(); height],
    ))?;
    df.with_column(Column::new(
        SOURCE_FILE_COLUMN.into(),
        vec![source_name.as_str(); height],
    ))?;

    let stem = data_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.clone());
    let output = output_dir.join(format!("{stem}.{PARQUET_EXTENSION}"));
    write_parquet(&mut df, &output)?;

    tracing::debug!(
        file = %source_name,
        rows = stats.rows,
        skipped = stats.skipped_lines,
        "decoded fixed-width file"
    );
    Ok(FileBuildReport {
        source: data_file.to_path_buf(),
        output,
        rows: stats.rows,
        skipped_lines: stats.skipped_lines,
        tumor_type,
    })
}

/// Sends events to the build observers, escalating to `on_alert` at the configured threshold.
struct Reporter {
    observer: CompositeObserver,
    alert_at_or_above: BuildSeverity,
}

impl Reporter {
    fn emit(&self, event: BuildEvent) {
        self.observer.on_event(&event);
        if event.severity() >= self.alert_at_or_above {
            self.observer.on_alert(&event);
        }
    }
}

/// Validated inputs of a directory build.
struct BuildPlan {
    data_dir: PathBuf,
    output_dir: PathBuf,
    sources: SourceSet,
    layout_file: Option<PathBuf>,
    columns_override: Option<PathBuf>,
    memory_limit: MemoryLimit,
}

/// Build a reconciled Parquet dataset from the `.dat` (or `.parquet`) files in `data_dir`.
///
/// Validation failures are returned before anything is written. Once the output directory
/// exists, failures are reported as [`BuildEvent::BuildFailed`] and partial output is kept.
pub fn build_parquet_dataset(
    data_dir: impl AsRef<Path>,
    opts: &BuildOptions,
) -> NcdbResult<BuildOutcome> {
    let plan = plan_build(data_dir.as_ref(), opts)?;
    validate_directory(&plan.output_dir, false, true, "output directory")?;

    let log = plan.output_dir.join(BUILD_LOG_FILE_NAME);
    let mut observer = CompositeObserver::new(vec![Arc::new(FileObserver::new(&log))]);
    if let Some(o) = &opts.observer {
        observer.push(Arc::clone(o));
    }
    let reporter = Reporter {
        observer,
        alert_at_or_above: opts.alert_at_or_above,
    };

    tracing::info!(
        data_dir = %sanitize_path_for_logging(&plan.data_dir),
        output_dir = %sanitize_path_for_logging(&plan.output_dir),
        memory_limit = %opts.memory_limit,
        "starting NCDB dataset build"
    );

    match run_build(&plan, opts, &reporter, log) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::error!(error = %e, "dataset build failed");
            reporter.emit(BuildEvent::BuildFailed {
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

fn plan_build(data_dir: &Path, opts: &BuildOptions) -> NcdbResult<BuildPlan> {
    let data_dir = validate_directory(data_dir, true, false, "data directory")?;
    let memory_limit = MemoryLimit::parse(&opts.memory_limit)?;
    if opts.num_threads == 0 {
        return Err(NcdbError::validation("num_threads must be > 0"));
    }

    let sources = SourceSet::discover(&data_dir)?;

    let layout_file = match &opts.layout {
        Some(path) => Some(validate_path(path, true, &[LAYOUT_FILE_EXTENSION], "layout file")?),
        None => find_layout_file(&data_dir)?,
    };
    if sources.format == SourceFormat::FixedWidth && layout_file.is_none() {
        return Err(NcdbError::format(
            None,
            format!(
                "layout specification missing: no .{LAYOUT_FILE_EXTENSION} file in {}",
                data_dir.display()
            ),
        ));
    }

    let columns_override = opts
        .columns_override
        .as_ref()
        .map(|p| validate_path(p, true, &[COLUMNS_FILE_EXTENSION], "column override file"))
        .transpose()?;

    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&data_dir, Local::now().date_naive()));
    let output_dir = validate_path(output_dir, false, &[], "output directory")?;

    Ok(BuildPlan {
        data_dir,
        output_dir,
        sources,
        layout_file,
        columns_override,
        memory_limit,
    })
}

/// The first `.sas` file in `dir`, by name.
fn find_layout_file(dir: &Path) -> NcdbResult<Option<PathBuf>> {
    let pattern = dir.join(format!("*.{LAYOUT_FILE_EXTENSION}"));
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| NcdbError::validation(format!("invalid search pattern {pattern}: {e}")))?;

    let mut found: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    found.sort();
    if found.len() > 1 {
        tracing::warn!(
            candidates = found.len(),
            chosen = %file_name(&found[0]),
            "several layout files found; using the first"
        );
    }
    Ok(found.into_iter().next())
}

fn run_build(
    plan: &BuildPlan,
    opts: &BuildOptions,
    reporter: &Reporter,
    log: PathBuf,
) -> NcdbResult<BuildOutcome> {
    let start = Instant::now();
    reporter.emit(BuildEvent::BuildStarted {
        data_dir: plan.data_dir.clone(),
        output_dir: plan.output_dir.clone(),
        input_files: plan.sources.files.len(),
    });

    let engine = ExecutionEngine::new(ExecutionOptions {
        num_threads: opts.num_threads,
    })?;

    let layout = plan
        .layout_file
        .as_ref()
        .map(|path| load_layout(path, plan.columns_override.as_deref(), opts.record_length))
        .transpose()?;

    let files = match (plan.sources.format, &layout) {
        (SourceFormat::FixedWidth, Some(layout)) => {
            let reports = engine.run_per_file(&plan.sources.files, |file| {
                decode_to_parquet(file, layout, &plan.output_dir, opts.record_length, opts.batch_size)
            })?;
            for r in &reports {
                reporter.emit(BuildEvent::FileDecoded {
                    file: r.source.clone(),
                    rows: r.rows,
                    skipped_lines: r.skipped_lines,
                });
            }
            reports
        }
        (SourceFormat::FixedWidth, None) => {
            return Err(NcdbError::format(None, "layout specification missing"));
        }
        (SourceFormat::Parquet, _) => {
            copy_parquet_inputs(plan, reporter)?;
            Vec::new()
        }
    };

    if opts.apply_transforms {
        let no_labels = ValueLabelMap::new();
        let labels = layout.as_ref().map_or(&no_labels, |l| &l.value_labels);
        let report = apply_transformations_with(&plan.output_dir, labels, &engine)?;
        reporter.emit(BuildEvent::SchemaResolved {
            columns: report.global_schema.len(),
        });
        for (file, columns) in report.files {
            reporter.emit(BuildEvent::FileTransformed { file, columns });
        }
    }

    let dataset_info = if opts.verify_files {
        let info = inspect_parquet_files(&plan.output_dir)?;
        reporter.emit(BuildEvent::DatasetVerified {
            files: info.total_files,
            total_rows: info.total_rows as usize,
            schema_consistent: info.schemas_consistent,
        });
        Some(info)
    } else {
        None
    };

    let dictionary = if opts.generate_dictionary {
        let paths = DataDictionary::from_path(&plan.output_dir, layout.as_ref(), &opts.dictionary)?
            .write(&plan.output_dir, &opts.dictionary.formats)?;
        if let Some(primary) = paths.primary() {
            reporter.emit(BuildEvent::DictionaryWritten {
                path: primary.to_path_buf(),
            });
        }
        Some(paths)
    } else {
        None
    };

    let summary = plan.output_dir.join(SUMMARY_FILE_NAME);
    write_summary(
        &summary,
        &BuildSummary {
            build_timestamp: Local::now().to_rfc3339(),
            data_directory: plan.data_dir.clone(),
            output_directory: plan.output_dir.clone(),
            memory_limit: opts.memory_limit.clone(),
            memory_limit_bytes: plan.memory_limit.bytes(),
            dataset_type: detect_dataset_type(&plan.data_dir).to_string(),
            files: files.clone(),
            dataset_info: dataset_info.clone(),
        },
    )?;

    reporter.emit(BuildEvent::BuildFinished {
        output_dir: plan.output_dir.clone(),
        elapsed: start.elapsed(),
    });
    tracing::info!(elapsed = ?start.elapsed(), "NCDB dataset build completed");

    Ok(BuildOutcome {
        parquet_dir: plan.output_dir.clone(),
        dictionary,
        log,
        summary,
        dataset_info,
        files,
    })
}

/// Copy existing Parquet inputs into the output directory unless they already live there.
fn copy_parquet_inputs(plan: &BuildPlan, reporter: &Reporter) -> NcdbResult<()> {
    if same_directory(&plan.data_dir, &plan.output_dir) {
        return Ok(());
    }
    for file in &plan.sources.files {
        let target = plan.output_dir.join(file_name(file));
        fs::copy(file, &target)?;
        reporter.emit(BuildEvent::FileCopied { file: file.clone() });
    }
    Ok(())
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn write_summary(path: &Path, summary: &BuildSummary) -> NcdbResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, summary)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = BuildOptions::default();
        assert_eq!(opts.memory_limit, "4GB");
        assert_eq!(opts.num_threads, 1);
        assert_eq!(opts.record_length, 1032);
        assert!(opts.generate_dictionary && opts.apply_transforms && opts.verify_files);
        assert_eq!(opts.alert_at_or_above, BuildSeverity::Error);
    }

    #[test]
    fn options_from_env_config() {
        let cfg = EnvConfig {
            data_dir: None,
            output_dir: Some(PathBuf::from("/out")),
            memory_limit: "8GB".to_string(),
        };
        let opts = BuildOptions::from_env_config(&cfg);
        assert_eq!(opts.output_dir, Some(PathBuf::from("/out")));
        assert_eq!(opts.memory_limit, "8GB");
        assert!(format!("{opts:?}").contains("observer_set: false"));
    }

    #[test]
    fn missing_data_directory_is_a_validation_error() {
        let err = build_parquet_dataset("/definitely/not/here", &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, NcdbError::Validation { .. }));
    }
}
