//! Per-file job execution with configurable parallelism.
//!
//! Decoding and transforming are independent per input file. The [`ExecutionEngine`] runs one
//! job per file on a `rayon` pool and returns results in input order. With the default single
//! thread, files are processed one after another.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{NcdbError, NcdbResult};
use crate::ingestion::inspect::file_name;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Number of files processed concurrently. Must be at least 1.
    pub num_threads: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self { num_threads: 1 }
    }
}

/// Runs per-file jobs on a dedicated thread pool.
#[derive(Debug)]
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
}

impl ExecutionEngine {
    pub fn new(opts: ExecutionOptions) -> NcdbResult<Self> {
        if opts.num_threads == 0 {
            return Err(NcdbError::validation("num_threads must be > 0"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(opts.num_threads)
            .thread_name(|i| format!("ncdb-worker-{i}"))
            .build()?;

        Ok(Self { pool, opts })
    }

    /// Single-threaded engine.
    pub fn sequential() -> NcdbResult<Self> {
        Self::new(ExecutionOptions::default())
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Run `job` once per file. Results are in the order of `files`; the first error is returned.
    pub fn run_per_file<T, F>(&self, files: &[PathBuf], job: F) -> NcdbResult<Vec<T>>
    where
        T: Send,
        F: Fn(&Path) -> NcdbResult<T> + Send + Sync,
    {
        let start = Instant::now();
        let result = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| timed(file, &job))
                .collect::<NcdbResult<Vec<T>>>()
        });
        tracing::debug!(
            jobs = files.len(),
            threads = self.opts.num_threads,
            elapsed = ?start.elapsed(),
            ok = result.is_ok(),
            "per-file run finished"
        );
        result
    }
}

fn timed<T, F>(file: &Path, job: &F) -> NcdbResult<T>
where
    F: Fn(&Path) -> NcdbResult<T>,
{
    let start = Instant::now();
    let out = job(file);
    tracing::debug!(
        file = %file_name(file),
        elapsed = ?start.elapsed(),
        ok = out.is_ok(),
        "job finished"
    );
    out
}
