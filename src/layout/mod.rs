//! Layout specification parsing.
//!
//! A layout turns a fixed-width record into named fields. It comes from a SAS-style program
//! ([`sas`]) and can optionally have its field positions replaced by a `name,start,end` CSV table
//! ([`columns`]). Both sources use 1-based, inclusive column numbers; the resulting
//! [`FieldDefinition`]s are 0-based and half-open.
//!
//! ```no_run
//! use ncdb_tools::layout::load_layout;
//!
//! # fn main() -> Result<(), ncdb_tools::NcdbError> {
//! let layout = load_layout("NCDB_PUF_Labels_2022.sas", None, 1032)?;
//! println!("fields={}", layout.fields.len());
//! # Ok(())
//! # }
//! ```

pub mod columns;
pub mod sas;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{NcdbError, NcdbResult};
use crate::types::{FieldDefinition, LayoutSpec, ValueLabelMap};

/// A field position as written in a layout source: 1-based, inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub name: String,
    pub first: usize,
    pub last: usize,
}

/// Parse SAS layout text into a validated [`LayoutSpec`].
pub fn parse_layout(text: &str, record_length: usize) -> NcdbResult<LayoutSpec> {
    let doc = sas::parse_sas(text, None)?;
    let fields = resolve_positions(&doc.fields, record_length, None)?;
    Ok(assemble(fields, doc))
}

/// Read and parse a layout file, optionally replacing its field positions with a CSV override.
///
/// Labels always come from the SAS file. A missing layout file is a format error, since no
/// record can be decoded without field positions.
pub fn load_layout(
    path: impl AsRef<Path>,
    columns_override: Option<&Path>,
    record_length: usize,
) -> NcdbResult<LayoutSpec> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(NcdbError::format(
            Some(path.to_path_buf()),
            "layout specification missing",
        ));
    }

    let bytes = fs::read(path)?;
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
    let doc = sas::parse_sas(&text, Some(path))?;

    let fields = match columns_override {
        Some(csv_path) => {
            let raw = columns::read_column_positions(csv_path)?;
            resolve_positions(&raw, record_length, Some(csv_path))?
        }
        None => resolve_positions(&doc.fields, record_length, Some(path))?,
    };

    let layout = assemble(fields, doc);
    tracing::debug!(
        fields = layout.fields.len(),
        value_labels = layout.value_labels.len(),
        "layout loaded"
    );
    Ok(layout)
}

/// Check raw positions and convert them to 0-based, half-open field definitions.
///
/// Rejects an empty list, start column 0, start after end, fields running past
/// `record_length`, duplicate names (case-insensitive) and overlapping ranges.
pub fn resolve_positions(
    raw: &[RawField],
    record_length: usize,
    source: Option<&Path>,
) -> NcdbResult<Vec<FieldDefinition>> {
    let err = |msg: String| NcdbError::format(source.map(Path::to_path_buf), msg);

    if raw.is_empty() {
        return Err(err("layout declares no input fields".to_string()));
    }

    let mut seen = HashSet::with_capacity(raw.len());
    for f in raw {
        if f.first == 0 {
            return Err(err(format!("field {} starts at column 0; columns are 1-based", f.name)));
        }
        if f.first > f.last {
            return Err(err(format!(
                "field {} has start {} after end {}",
                f.name, f.first, f.last
            )));
        }
        if f.last > record_length {
            return Err(err(format!(
                "field {} ends at column {} beyond record length {}",
                f.name, f.last, record_length
            )));
        }
        if !seen.insert(f.name.to_ascii_uppercase()) {
            return Err(err(format!("duplicate field name {}", f.name)));
        }
    }

    let mut by_start: Vec<&RawField> = raw.iter().collect();
    by_start.sort_by_key(|f| (f.first, f.last));
    for pair in by_start.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if cur.first <= prev.last {
            return Err(err(format!(
                "field {} ({}-{}) overlaps field {} ({}-{})",
                cur.name, cur.first, cur.last, prev.name, prev.first, prev.last
            )));
        }
    }

    Ok(raw
        .iter()
        .map(|f| FieldDefinition::from_one_based(f.name.clone(), f.first, f.last))
        .collect())
}

/// Attach format tables to the final field list.
///
/// Explicit `FORMAT` associations win; otherwise a table named like the field is used.
fn assemble(fields: Vec<FieldDefinition>, doc: sas::SasDocument) -> LayoutSpec {
    let sas::SasDocument {
        variable_labels,
        formats,
        associations,
        ..
    } = doc;

    let associations: BTreeMap<String, String> = associations
        .into_iter()
        .map(|(var, fmt)| (var.to_ascii_uppercase(), fmt))
        .collect();

    let mut value_labels = ValueLabelMap::new();
    for field in &fields {
        let key = field.name.to_ascii_uppercase();
        let table = associations
            .get(&key)
            .and_then(|fmt| formats.get(fmt))
            .or_else(|| formats.get(&key));
        if let Some(table) = table {
            value_labels.insert(field.name.clone(), table.clone());
        }
    }

    let variable_labels = fields
        .iter()
        .filter_map(|f| {
            variable_labels
                .get(&f.name.to_ascii_uppercase())
                .map(|label| (f.name.clone(), label.clone()))
        })
        .collect();

    LayoutSpec {
        fields,
        value_labels,
        variable_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, first: usize, last: usize) -> RawField {
        RawField {
            name: name.to_string(),
            first,
            last,
        }
    }

    #[test]
    fn resolves_one_based_inclusive_ranges() {
        let fields = resolve_positions(&[raw("A", 1, 3), raw("B", 4, 4)], 10, None).unwrap();
        assert_eq!(fields[0], FieldDefinition { name: "A".into(), start: 0, end: 3 });
        assert_eq!(fields[1], FieldDefinition { name: "B".into(), start: 3, end: 4 });
    }

    #[test]
    fn rejects_invalid_positions() {
        let cases = [
            (vec![], "no input fields"),
            (vec![raw("A", 0, 3)], "1-based"),
            (vec![raw("A", 5, 3)], "after end"),
            (vec![raw("A", 5, 11)], "beyond record length"),
            (vec![raw("A", 1, 3), raw("a", 4, 5)], "duplicate"),
            (vec![raw("A", 1, 3), raw("B", 3, 5)], "overlaps"),
        ];
        for (fields, needle) in cases {
            let err = resolve_positions(&fields, 10, None).unwrap_err();
            assert!(matches!(err, NcdbError::Format { .. }));
            assert!(err.to_string().contains(needle), "{err}");
        }
    }

    #[test]
    fn missing_layout_file_is_a_format_error() {
        let err = load_layout("/definitely/not/here.sas", None, 1032).unwrap_err();
        assert!(matches!(err, NcdbError::Format { .. }));
        assert!(err.to_string().contains("layout specification missing"));
    }
}
