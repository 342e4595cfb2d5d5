//! Column-position override table.
//!
//! A CSV with a `name,start,end` header, positions 1-based and inclusive:
//!
//! ```text
//! name,start,end
//! PUF_CASE_ID,1,10
//! AGE,11,13
//! ```

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::error::{NcdbError, NcdbResult};

use super::RawField;

#[derive(Debug, Deserialize)]
struct ColumnRow {
    name: String,
    start: String,
    end: String,
}

/// Read field positions from an override CSV. Positions are validated later, together with the
/// record length.
pub fn read_column_positions(path: impl AsRef<Path>) -> NcdbResult<Vec<RawField>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    read_column_positions_from_reader(&mut rdr, Some(path))
}

/// Same as [`read_column_positions`], from an existing CSV reader.
pub fn read_column_positions_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    source: Option<&Path>,
) -> NcdbResult<Vec<RawField>> {
    let err = |msg: String| NcdbError::format(source.map(Path::to_path_buf), msg);

    let mut fields = Vec::new();
    for (idx0, row) in rdr.deserialize::<ColumnRow>().enumerate() {
        let line = idx0 + 2;
        let row = row.map_err(|e| err(format!("column table row {line}: {e}")))?;
        if row.name.is_empty() {
            return Err(err(format!("column table row {line}: empty field name")));
        }
        let position = |raw: &str, which: &str| {
            if raw.is_empty() {
                return Err(err(format!("field {} has a missing {which} position", row.name)));
            }
            raw.parse::<usize>().map_err(|_| {
                err(format!(
                    "field {} has non-numeric {which} position '{raw}'",
                    row.name
                ))
            })
        };
        let first = position(&row.start, "start")?;
        let last = position(&row.end, "end")?;
        fields.push(RawField {
            name: row.name.clone(),
            first,
            last,
        });
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(input: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(input.as_bytes())
    }

    #[test]
    fn reads_rows_in_order() {
        let mut rdr = reader("name,start,end\nID, 1, 10\nAGE,11,13\n");
        let fields = read_column_positions_from_reader(&mut rdr, None).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].name, "AGE");
        assert_eq!((fields[1].first, fields[1].last), (11, 13));
    }

    #[test]
    fn non_numeric_and_missing_positions_are_format_errors() {
        let mut rdr = reader("name,start,end\nID,one,10\n");
        let err = read_column_positions_from_reader(&mut rdr, None).unwrap_err();
        assert!(matches!(err, NcdbError::Format { .. }));
        assert!(err.to_string().contains("non-numeric start position 'one'"));

        let mut rdr = reader("name,start,end\nID,1,\n");
        let err = read_column_positions_from_reader(&mut rdr, None).unwrap_err();
        assert!(err.to_string().contains("missing end position"));
    }

    #[test]
    fn missing_header_column_is_a_format_error() {
        let mut rdr = reader("name,start\nID,1\n");
        let err = read_column_positions_from_reader(&mut rdr, None).unwrap_err();
        assert!(matches!(err, NcdbError::Format { .. }));
    }
}
