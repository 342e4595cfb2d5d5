//! Fixed-width record decoding.
//!
//! Data files are windows-1252 text with one record per line. Lines are read as raw bytes so
//! that field offsets are byte offsets, and each field is decoded on its own.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use polars::prelude::*;
use regex::Regex;

use crate::constants::{DEFAULT_BATCH_SIZE, NCDB_RECORD_LENGTH, UNKNOWN_TUMOR_TYPE};
use crate::error::NcdbResult;
use crate::types::{FieldDefinition, Record};

static TUMOR_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^NCDBPUF_(.+?)\..*\.dat").expect("invalid tumor type regex")
});

/// Line counts for one decoded input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Records decoded.
    pub rows: usize,
    /// Non-blank lines dropped because their length differs from the record length.
    pub skipped_lines: usize,
}

/// Decode a single field: windows-1252 → UTF-8, trimmed, blank → `None`.
pub fn decode_field(bytes: &[u8]) -> Option<String> {
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Decode one line (line terminator already removed).
///
/// Returns `None` when the line is not exactly `record_length` bytes long.
pub fn decode_line(line: &[u8], fields: &[FieldDefinition], record_length: usize) -> Option<Record> {
    if line.len() != record_length {
        return None;
    }
    let values = fields
        .iter()
        .map(|f| line.get(f.start..f.end).and_then(decode_field))
        .collect();
    Some(Record { values })
}

/// Tumor type encoded in a PUF file name (`NCDBPUF_<type>.<anything>.dat`).
pub fn tumor_type_from_file_name(file_name: &str) -> String {
    TUMOR_TYPE_REGEX
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map_or_else(|| UNKNOWN_TUMOR_TYPE.to_string(), |m| m.as_str().to_string())
}

/// Batched reader turning fixed-width lines into a string-typed [`DataFrame`].
///
/// Every column of the produced frame is `String`; typing happens afterwards in
/// [`super::inference`].
#[derive(Debug, Clone)]
pub struct FixedWidthReader<'a> {
    fields: &'a [FieldDefinition],
    record_length: usize,
    batch_size: usize,
}

impl<'a> FixedWidthReader<'a> {
    pub fn new(fields: &'a [FieldDefinition]) -> Self {
        Self {
            fields,
            record_length: NCDB_RECORD_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_record_length(mut self, record_length: usize) -> Self {
        self.record_length = record_length;
        self
    }

    /// Records per batch; values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn read_path(&self, path: impl AsRef<Path>) -> NcdbResult<(DataFrame, DecodeStats)> {
        let file = File::open(path.as_ref())?;
        self.read(BufReader::new(file))
    }

    pub fn read<R: BufRead>(&self, mut reader: R) -> NcdbResult<(DataFrame, DecodeStats)> {
        let mut stats = DecodeStats::default();
        let mut batch = ColumnBatch::new(self.fields.len(), self.batch_size);
        let mut out: Option<DataFrame> = None;
        let mut buf = Vec::with_capacity(self.record_length + 2);

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = strip_line_terminator(&buf);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match decode_line(line, self.fields, self.record_length) {
                Some(record) => {
                    batch.push(record);
                    stats.rows += 1;
                }
                None => stats.skipped_lines += 1,
            }

            if batch.len() >= self.batch_size {
                append(&mut out, batch.flush(self.fields)?)?;
            }
        }

        if !batch.is_empty() || out.is_none() {
            append(&mut out, batch.flush(self.fields)?)?;
        }

        if stats.skipped_lines > 0 {
            tracing::debug!(
                skipped = stats.skipped_lines,
                record_length = self.record_length,
                "dropped lines with unexpected length"
            );
        }

        let df = match out {
            Some(df) => df,
            None => empty_frame(self.fields)?,
        };
        Ok((df, stats))
    }
}

fn strip_line_terminator(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn append(out: &mut Option<DataFrame>, batch: DataFrame) -> NcdbResult<()> {
    match out {
        Some(df) => {
            df.vstack_mut(&batch)?;
        }
        None => *out = Some(batch),
    }
    Ok(())
}

/// An empty frame with one `String` column per field.
pub fn empty_frame(fields: &[FieldDefinition]) -> NcdbResult<DataFrame> {
    let columns = fields
        .iter()
        .map(|f| Column::new(f.name.as_str().into(), Vec::<Option<String>>::new()))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Per-column builders for records awaiting a flush.
struct ColumnBatch {
    columns: Vec<Vec<Option<String>>>,
    capacity: usize,
    len: usize,
}

impl ColumnBatch {
    fn new(width: usize, capacity: usize) -> Self {
        Self {
            columns: (0..width).map(|_| Vec::with_capacity(capacity)).collect(),
            capacity,
            len: 0,
        }
    }

    fn push(&mut self, record: Record) {
        for (column, value) in self.columns.iter_mut().zip(record.values) {
            column.push(value);
        }
        self.len += 1;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn flush(&mut self, fields: &[FieldDefinition]) -> NcdbResult<DataFrame> {
        let columns = fields
            .iter()
            .zip(self.columns.iter_mut())
            .map(|(f, values)| {
                let values = std::mem::replace(values, Vec::with_capacity(self.capacity));
                Column::new(f.name.as_str().into(), values)
            })
            .collect();
        self.len = 0;
        Ok(DataFrame::new(columns)?)
    }
}
