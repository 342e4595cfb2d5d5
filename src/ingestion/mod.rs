//! Reading inputs and writing per-file Parquet output.
//!
//! - [`fixed_width`]: decode fixed-width PUF lines into string columns
//! - [`inference`]: per-file column typing of decoded frames
//! - [`sources`]: discover `.dat` / `.parquet` inputs in a data directory
//! - [`parquet`]: Parquet read/write helpers
//! - [`inspect`]: footer-level verification of a written dataset
//! - [`observability`]: build events and observers

pub mod fixed_width;
pub mod inference;
pub mod inspect;
pub mod observability;
pub mod parquet;
pub mod sources;

pub use fixed_width::{DecodeStats, FixedWidthReader, decode_line, tumor_type_from_file_name};
pub use inference::{apply_inferred_types, infer_column_type, infer_file_schema};
pub use inspect::{
    ColumnStatistics, DatasetInfo, FileInfo, NullStatistics, get_column_statistics,
    inspect_parquet_files,
};
pub use observability::{
    BuildEvent, BuildObserver, BuildSeverity, CompositeObserver, FileObserver, StdErrObserver,
    TracingObserver,
};
pub use sources::{DatasetType, SourceFormat, SourceSet, detect_dataset_type};
