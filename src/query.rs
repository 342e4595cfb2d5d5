//! Fluent, lazy queries over a built Parquet dataset.
//!
//! [`NcdbQuery`] wraps a Polars [`LazyFrame`]. Named filters know the registry's column
//! conventions; anything else goes through the escape hatches ([`NcdbQuery::filter`],
//! [`NcdbQuery::select`], [`NcdbQuery::apply`], ...). Nothing is read until a terminal
//! operation runs.
//!
//! ```no_run
//! use ncdb_tools::query::load_data;
//!
//! # fn main() -> Result<(), ncdb_tools::NcdbError> {
//! let breast = load_data("ncdb_parquet_20240101")?
//!     .filter_by_primary_site(["C500", "C509"])?
//!     .filter_by_year(&[2020, 2021])?
//!     .drop_missing_vital_status()?;
//! println!("cases={}", breast.count()?);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;

use crate::constants::{
    DEMOGRAPHIC_COLUMNS, HISTOLOGY_COLUMN, LARGE_RESULT_ROWS, OUTCOME_COLUMNS,
    PRIMARY_SITE_COLUMN, STAGE_COLUMN, TREATMENT_COLUMNS, VITAL_STATUS_COLUMN, YEAR_COLUMN,
};
use crate::error::{NcdbError, NcdbResult};
use crate::ingestion::sources::list_parquet_files;

/// Name the dataset is registered under for [`NcdbQuery::sql`].
pub const SQL_TABLE_NAME: &str = "ncdb";

const COUNT_ALIAS: &str = "__ncdb_count";

/// Lazily scan a Parquet file, or every `*.parquet` file of a directory.
///
/// Files in a directory are combined with a diagonal concat, so a column missing from one file
/// is null for that file's rows.
pub fn scan_path(path: &Path) -> NcdbResult<LazyFrame> {
    if !path.exists() {
        return Err(NcdbError::validation(format!(
            "parquet path does not exist: {}",
            path.display()
        )));
    }

    if path.is_file() {
        return scan_file(path);
    }

    let files = list_parquet_files(path)?;
    if files.is_empty() {
        return Err(NcdbError::validation(format!(
            "no parquet files found in directory: {}",
            path.display()
        )));
    }

    let frames = files
        .iter()
        .map(|f| scan_file(f))
        .collect::<NcdbResult<Vec<_>>>()?;
    match <[LazyFrame; 1]>::try_from(frames) {
        Ok([single]) => Ok(single),
        Err(frames) => Ok(concat_lf_diagonal(frames, UnionArgs::default())?),
    }
}

fn scan_file(path: &Path) -> NcdbResult<LazyFrame> {
    let path = PlPath::new(&path.to_string_lossy());
    Ok(LazyFrame::scan_parquet(path, ScanArgsParquet::default())?)
}

/// Open a dataset for querying. Same as [`NcdbQuery::open`].
pub fn load_data(path: impl AsRef<Path>) -> NcdbResult<NcdbQuery> {
    NcdbQuery::open(path)
}

/// Reported when a collected result is larger than the configured threshold.
///
/// The result is still returned in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargeResultWarning {
    pub rows: usize,
    pub threshold: usize,
}

impl fmt::Display for LargeResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "collected {} rows (threshold {}); consider filtering or sampling first",
            self.rows, self.threshold
        )
    }
}

/// Output of [`NcdbQuery::collect`].
#[derive(Debug, Clone)]
pub struct Collected {
    pub frame: DataFrame,
    pub warning: Option<LargeResultWarning>,
}

impl Collected {
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}

/// Summary returned by [`NcdbQuery::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDescription {
    pub total_rows: u64,
    pub columns: usize,
    /// First ten column names, followed by `"..."` when there are more.
    pub column_names: Vec<String>,
    pub parquet_path: PathBuf,
}

/// A lazy query over an NCDB Parquet dataset.
#[derive(Clone)]
pub struct NcdbQuery {
    path: PathBuf,
    lf: LazyFrame,
    large_result_rows: usize,
}

impl fmt::Debug for NcdbQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NcdbQuery")
            .field("path", &self.path)
            .field("large_result_rows", &self.large_result_rows)
            .finish_non_exhaustive()
    }
}

impl NcdbQuery {
    /// Open a Parquet file or a directory of Parquet files.
    pub fn open(path: impl AsRef<Path>) -> NcdbResult<Self> {
        let path = path.as_ref();
        Ok(Self {
            path: path.to_path_buf(),
            lf: scan_path(path)?,
            large_result_rows: LARGE_RESULT_ROWS,
        })
    }

    /// Wrap an existing lazy frame. `path` is only used for descriptions.
    pub fn from_lazy(lf: LazyFrame, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lf,
            large_result_rows: LARGE_RESULT_ROWS,
        }
    }

    /// Row count above which [`Self::collect`] attaches a [`LargeResultWarning`].
    pub fn with_large_result_threshold(mut self, rows: usize) -> Self {
        self.large_result_rows = rows;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---- named filters -------------------------------------------------------------------

    /// Keep rows whose `YEAR_OF_DIAGNOSIS` is one of `years` (compared numerically).
    pub fn filter_by_year(self, years: &[i32]) -> NcdbResult<Self> {
        let query = self.require(YEAR_COLUMN, "filter_by_year")?;
        let year = col(YEAR_COLUMN).cast(DataType::Int64);
        let predicate = any_of(year, years.iter().map(|y| lit(i64::from(*y))));
        Ok(query.map_lazy(|lf| lf.filter(predicate)))
    }

    /// Keep rows whose `PRIMARY_SITE` is one of `sites` (e.g. `"C509"`).
    pub fn filter_by_primary_site<I, S>(self, sites: I) -> NcdbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter_text_in(PRIMARY_SITE_COLUMN, "filter_by_primary_site", sites)
    }

    /// Keep rows whose `HISTOLOGY` is one of `codes`. Integer and string codes both work.
    pub fn filter_by_histology<I, C>(self, codes: I) -> NcdbResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: ToString,
    {
        let codes: Vec<String> = codes.into_iter().map(|c| c.to_string()).collect();
        self.filter_text_in(HISTOLOGY_COLUMN, "filter_by_histology", codes)
    }

    /// Keep rows whose `ANALYTIC_STAGE_GROUP` is one of `stages`.
    pub fn filter_by_stage<I, S>(self, stages: I) -> NcdbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter_text_in(STAGE_COLUMN, "filter_by_stage", stages)
    }

    /// Drop rows with a missing `PUF_VITAL_STATUS`.
    pub fn drop_missing_vital_status(self) -> NcdbResult<Self> {
        let query = self.require(VITAL_STATUS_COLUMN, "drop_missing_vital_status")?;
        Ok(query.map_lazy(|lf| lf.filter(col(VITAL_STATUS_COLUMN).is_not_null())))
    }

    /// Keep only columns with at least one value in the most recent diagnosis year.
    ///
    /// Runs two small queries immediately to find the year and the populated columns.
    pub fn filter_active_variables(self) -> NcdbResult<Self> {
        let query = self.require(YEAR_COLUMN, "filter_active_variables")?;
        let year = || col(YEAR_COLUMN).cast(DataType::Int64);

        let latest = query
            .lf
            .clone()
            .select([year().max().alias(YEAR_COLUMN)])
            .collect()?
            .column(YEAR_COLUMN)?
            .i64()?
            .get(0);
        let Some(latest) = latest else {
            tracing::warn!("no diagnosis year present; keeping all columns");
            return Ok(query);
        };

        let recent = query.lf.clone().filter(year().eq(lit(latest)));
        let total = recent
            .clone()
            .select([len().cast(DataType::UInt64).alias(COUNT_ALIAS)])
            .collect()?
            .column(COUNT_ALIAS)?
            .u64()?
            .get(0)
            .unwrap_or(0);
        let null_counts = recent.null_count().collect()?;

        let mut active = Vec::new();
        for column in null_counts.get_columns() {
            let nulls = column.cast(&DataType::UInt64)?.u64()?.get(0).unwrap_or(0);
            if nulls < total {
                active.push(col(column.name().clone()));
            }
        }
        tracing::debug!(
            year = latest,
            active = active.len(),
            total = null_counts.width(),
            "active variables"
        );

        Ok(query.map_lazy(|lf| lf.select(active)))
    }

    // ---- column sets ---------------------------------------------------------------------

    /// Demographic columns present in the dataset. Never fails on missing columns.
    pub fn select_demographics(self) -> NcdbResult<Self> {
        self.select_known(DEMOGRAPHIC_COLUMNS)
    }

    /// Treatment columns present in the dataset. Never fails on missing columns.
    pub fn select_treatment(self) -> NcdbResult<Self> {
        self.select_known(TREATMENT_COLUMNS)
    }

    /// Outcome columns present in the dataset. Never fails on missing columns.
    pub fn select_outcomes(self) -> NcdbResult<Self> {
        self.select_known(OUTCOME_COLUMNS)
    }

    fn select_known(self, canonical: &[&str]) -> NcdbResult<Self> {
        let present = self.columns()?;
        let exprs: Vec<Expr> = canonical
            .iter()
            .filter(|c| present.iter().any(|p| p == *c))
            .map(|c| col(*c))
            .collect();
        Ok(self.map_lazy(|lf| lf.select(exprs)))
    }

    // ---- escape hatches ------------------------------------------------------------------

    pub fn filter(self, predicate: Expr) -> Self {
        self.map_lazy(|lf| lf.filter(predicate))
    }

    pub fn select<E: AsRef<[Expr]>>(self, exprs: E) -> Self {
        self.map_lazy(|lf| lf.select(exprs))
    }

    pub fn with_columns<E: AsRef<[Expr]>>(self, exprs: E) -> Self {
        self.map_lazy(|lf| lf.with_columns(exprs))
    }

    pub fn group_by_agg<B, A>(self, by: B, aggs: A) -> Self
    where
        B: AsRef<[Expr]>,
        A: AsRef<[Expr]>,
    {
        self.map_lazy(|lf| lf.group_by(by).agg(aggs))
    }

    /// Apply any `LazyFrame -> LazyFrame` transformation.
    pub fn apply<F>(self, f: F) -> Self
    where
        F: FnOnce(LazyFrame) -> LazyFrame,
    {
        self.map_lazy(f)
    }

    /// Run a SQL query against the current frame, registered as `ncdb`.
    #[cfg(feature = "sql")]
    pub fn sql(self, query: &str) -> NcdbResult<Self> {
        let mut ctx = polars_sql::SQLContext::new();
        ctx.register(SQL_TABLE_NAME, self.lf.clone());
        let lf = ctx.execute(query)?;
        Ok(Self { lf, ..self })
    }

    pub fn lazy_frame(&self) -> &LazyFrame {
        &self.lf
    }

    pub fn into_lazy(self) -> LazyFrame {
        self.lf
    }

    // ---- terminal operations -------------------------------------------------------------

    /// Column names of the current query.
    pub fn columns(&self) -> NcdbResult<Vec<String>> {
        let schema = self.lf.clone().collect_schema()?;
        Ok(schema.iter_names().map(|n| n.to_string()).collect())
    }

    /// Number of rows, computed with a single `len()` aggregation.
    pub fn count(&self) -> NcdbResult<u64> {
        let df = self
            .lf
            .clone()
            .select([len().cast(DataType::UInt64).alias(COUNT_ALIAS)])
            .collect()?;
        Ok(df.column(COUNT_ALIAS)?.u64()?.get(0).unwrap_or(0))
    }

    /// Materialize the query. The row count is estimated first, and large results are
    /// returned with a warning.
    pub fn collect(self) -> NcdbResult<Collected> {
        let rows = usize::try_from(self.count()?).unwrap_or(usize::MAX);
        let warning = (rows > self.large_result_rows).then(|| {
            let warning = LargeResultWarning {
                rows,
                threshold: self.large_result_rows,
            };
            tracing::warn!(rows, threshold = self.large_result_rows, "{warning}");
            warning
        });
        let frame = self.lf.collect()?;
        Ok(Collected { frame, warning })
    }

    /// Materialize the query in slices of `batch_rows` rows.
    pub fn collect_batches(self, batch_rows: usize) -> NcdbResult<Batches> {
        let total = self.count()?;
        Ok(Batches {
            lf: self.lf,
            total,
            offset: 0,
            batch_rows: batch_rows.max(1) as u64,
        })
    }

    /// Random sample of up to `n` rows. The query is collected first.
    pub fn sample(&self, n: usize, seed: Option<u64>) -> NcdbResult<DataFrame> {
        let df = self.lf.clone().collect()?;
        let n = n.min(df.height());
        Ok(df.sample_n_literal(n, false, false, seed)?)
    }

    pub fn describe(&self) -> NcdbResult<QueryDescription> {
        let total_rows = self.count()?;
        let columns = self.columns()?;
        let mut column_names: Vec<String> = columns.iter().take(10).cloned().collect();
        if columns.len() > 10 {
            column_names.push("...".to_string());
        }
        Ok(QueryDescription {
            total_rows,
            columns: columns.len(),
            column_names,
            parquet_path: self.path.clone(),
        })
    }

    // ---- helpers -------------------------------------------------------------------------

    fn map_lazy<F>(self, f: F) -> Self
    where
        F: FnOnce(LazyFrame) -> LazyFrame,
    {
        Self {
            lf: f(self.lf),
            ..self
        }
    }

    fn require(self, column: &str, operation: &str) -> NcdbResult<Self> {
        if self.columns()?.iter().any(|c| c == column) {
            Ok(self)
        } else {
            Err(NcdbError::MissingColumn {
                column: column.to_string(),
                operation: operation.to_string(),
            })
        }
    }

    fn filter_text_in<I, S>(self, column: &str, operation: &str, values: I) -> NcdbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let query = self.require(column, operation)?;
        let text = col(column).cast(DataType::String);
        let predicate = any_of(text, values.into_iter().map(|v| lit(v.as_ref().to_string())));
        Ok(query.map_lazy(|lf| lf.filter(predicate)))
    }
}

impl fmt::Display for NcdbQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.count() {
            Ok(rows) => write!(f, "NcdbQuery(path={name}, rows={rows})"),
            Err(_) => write!(f, "NcdbQuery(path={name})"),
        }
    }
}

/// `value == c1 OR value == c2 ...`; an empty candidate list matches nothing.
fn any_of<I>(value: Expr, candidates: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    candidates
        .into_iter()
        .map(|c| value.clone().eq(c))
        .reduce(|acc, e| acc.or(e))
        .unwrap_or_else(|| lit(false))
}

/// Iterator returned by [`NcdbQuery::collect_batches`].
pub struct Batches {
    lf: LazyFrame,
    total: u64,
    offset: u64,
    batch_rows: u64,
}

impl fmt::Debug for Batches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batches")
            .field("total", &self.total)
            .field("offset", &self.offset)
            .field("batch_rows", &self.batch_rows)
            .finish_non_exhaustive()
    }
}

impl Iterator for Batches {
    type Item = NcdbResult<DataFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.total {
            return None;
        }
        let offset = self.offset;
        self.offset += self.batch_rows;
        let batch = self
            .lf
            .clone()
            .slice(offset as i64, self.batch_rows as IdxSize)
            .collect()
            .map_err(NcdbError::from);
        Some(batch)
    }
}
