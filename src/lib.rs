//! `ncdb-tools` converts fixed-width NCDB Participant User Files into a reconciled Parquet
//! dataset, and queries it through a fluent, lazy [Polars](https://pola.rs) layer.
//!
//! The primary entrypoints are [`builder::build_parquet_dataset`] (a whole data directory) and
//! [`query::load_data`] (querying the result).
//!
//! ## Building a dataset
//!
//! A data directory holds one or more `NCDBPUF_*.dat` files plus the SAS layout program shipped
//! with them. Every record is a 1032-byte line; field positions come from the layout's `INPUT`
//! statement, value labels from its `PROC FORMAT` block.
//!
//! ```no_run
//! use ncdb_tools::builder::{build_parquet_dataset, BuildOptions};
//!
//! # fn main() -> Result<(), ncdb_tools::NcdbError> {
//! let outcome = build_parquet_dataset("/data/ncdb", &BuildOptions::default())?;
//! if let Some(info) = &outcome.dataset_info {
//!     println!("files={} rows={}", info.total_files, info.total_rows);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The build:
//!
//! - decodes each file (windows-1252, lines of the wrong length are skipped and counted)
//! - infers a per-file type for every column; codes with meaningful leading zeros stay text
//! - reconciles types across files (`String` > `Float64` > `Int64`)
//! - adds `AGE_AS_INT`, `AGE_IS_90_PLUS`, `SITE_GROUP`, `HISTOLOGY_GROUP` and `<COL>_LABEL`
//! - writes `data_dictionary.{csv,json,html}`, `dataset_summary.json` and `build.log`
//!
//! ## Querying
//!
//! ```no_run
//! use ncdb_tools::query::load_data;
//!
//! # fn main() -> Result<(), ncdb_tools::NcdbError> {
//! let collected = load_data("/data/ncdb/ncdb_parquet_20240101")?
//!     .filter_by_year(&[2020, 2021])?
//!     .filter_by_primary_site(["C509"])?
//!     .select_demographics()?
//!     .collect()?;
//! println!("{}", collected.frame);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`layout`]: SAS layout parsing and the CSV position override
//! - [`ingestion`]: fixed-width decoding, type inference, Parquet I/O, inspection, build events
//! - [`schema`]: cross-file type reconciliation
//! - [`transform`]: casts, derived columns and label columns
//! - [`query`]: lazy query facade
//! - [`dictionary`]: data dictionary generation
//! - [`builder`]: end-to-end builds
//! - [`execution`]: per-file thread pool
//! - [`config`], [`validation`]: environment configuration and input checks
//! - [`error`]: error types

pub mod builder;
pub mod config;
pub mod constants;
pub mod dictionary;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod layout;
pub mod query;
pub mod schema;
pub mod transform;
pub mod types;
pub mod validation;

pub use error::{NcdbError, NcdbResult};
