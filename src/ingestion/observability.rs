//! Build event reporting.
//!
//! The build pipeline reports progress as [`BuildEvent`]s to a caller-supplied
//! [`BuildObserver`]. Nothing is logged globally; callers pick the sinks.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildSeverity {
    /// Informational event.
    Info,
    /// Something the caller should look at; the build continues.
    Warning,
    /// The build failed.
    Error,
}

/// Progress and outcome events emitted while building a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    BuildStarted {
        data_dir: PathBuf,
        output_dir: PathBuf,
        input_files: usize,
    },
    /// One fixed-width file was decoded and written to Parquet.
    FileDecoded {
        file: PathBuf,
        rows: usize,
        skipped_lines: usize,
    },
    /// An existing Parquet file was copied into the output directory.
    FileCopied { file: PathBuf },
    SchemaResolved { columns: usize },
    FileTransformed { file: PathBuf, columns: usize },
    DatasetVerified {
        files: usize,
        total_rows: usize,
        schema_consistent: bool,
    },
    DictionaryWritten { path: PathBuf },
    BuildFinished { output_dir: PathBuf, elapsed: Duration },
    BuildFailed { message: String },
}

impl BuildEvent {
    pub fn severity(&self) -> BuildSeverity {
        match self {
            Self::FileDecoded { skipped_lines, .. } if *skipped_lines > 0 => BuildSeverity::Warning,
            Self::DatasetVerified {
                schema_consistent: false,
                ..
            } => BuildSeverity::Warning,
            Self::BuildFailed { .. } => BuildSeverity::Error,
            _ => BuildSeverity::Info,
        }
    }
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildStarted {
                data_dir,
                output_dir,
                input_files,
            } => write!(
                f,
                "build started data_dir={} output_dir={} input_files={input_files}",
                data_dir.display(),
                output_dir.display()
            ),
            Self::FileDecoded {
                file,
                rows,
                skipped_lines,
            } => write!(
                f,
                "decoded file={} rows={rows} skipped_lines={skipped_lines}",
                file.display()
            ),
            Self::FileCopied { file } => write!(f, "copied file={}", file.display()),
            Self::SchemaResolved { columns } => write!(f, "schema resolved columns={columns}"),
            Self::FileTransformed { file, columns } => {
                write!(f, "transformed file={} columns={columns}", file.display())
            }
            Self::DatasetVerified {
                files,
                total_rows,
                schema_consistent,
            } => write!(
                f,
                "verified files={files} total_rows={total_rows} schema_consistent={schema_consistent}"
            ),
            Self::DictionaryWritten { path } => write!(f, "dictionary written path={}", path.display()),
            Self::BuildFinished { output_dir, elapsed } => write!(
                f,
                "build finished output_dir={} elapsed={elapsed:?}",
                output_dir.display()
            ),
            Self::BuildFailed { message } => write!(f, "build failed err={message}"),
        }
    }
}

/// Observer interface for build events.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait BuildObserver: Send + Sync {
    fn on_event(&self, event: &BuildEvent);

    /// Called when an event meets the build's alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_event`].
    fn on_alert(&self, event: &BuildEvent) {
        self.on_event(event)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn BuildObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn BuildObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn BuildObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl BuildObserver for CompositeObserver {
    fn on_event(&self, event: &BuildEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_alert(&self, event: &BuildEvent) {
        for o in &self.observers {
            o.on_alert(event);
        }
    }
}

/// Logs build events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl BuildObserver for StdErrObserver {
    fn on_event(&self, event: &BuildEvent) {
        eprintln!("[build][{:?}] {event}", event.severity());
    }

    fn on_alert(&self, event: &BuildEvent) {
        eprintln!("[ALERT][build][{:?}] {event}", event.severity());
    }
}

/// Forwards build events to `tracing` at a level matching their severity.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn on_event(&self, event: &BuildEvent) {
        match event.severity() {
            BuildSeverity::Info => tracing::info!(target: "ncdb_tools::build", "{event}"),
            BuildSeverity::Warning => tracing::warn!(target: "ncdb_tools::build", "{event}"),
            BuildSeverity::Error => tracing::error!(target: "ncdb_tools::build", "{event}"),
        }
    }
}

/// Appends build events to a local log file (the per-build `build.log`).
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl BuildObserver for FileObserver {
    fn on_event(&self, event: &BuildEvent) {
        self.append_line(&format!(
            "{} - {:?} - {event}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.severity()
        ));
    }

    fn on_alert(&self, event: &BuildEvent) {
        self.append_line(&format!(
            "{} - ALERT {:?} - {event}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.severity()
        ));
    }
}
