//! Core data model types shared by the layout parser, decoder, reconciler and transforms.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

/// Logical scalar type of a column in the reconciled dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean (derived flags only).
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl ColumnType {
    /// Polars dtype used when casting or writing a column of this type.
    pub fn to_polars(self) -> DataType {
        match self {
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Bool => DataType::Boolean,
            Self::Utf8 => DataType::String,
        }
    }

    /// Maps a Polars dtype onto the closed set of column types.
    ///
    /// Every integer width collapses to `Int64`, every float width to `Float64`; anything that is
    /// not numeric or boolean is treated as text.
    pub fn from_polars(dtype: &DataType) -> Self {
        if dtype.is_bool() {
            Self::Bool
        } else if dtype.is_integer() {
            Self::Int64
        } else if dtype.is_float() {
            Self::Float64
        } else {
            Self::Utf8
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int64 => "Int64",
            Self::Float64 => "Float64",
            Self::Bool => "Boolean",
            Self::Utf8 => "String",
        };
        f.write_str(s)
    }
}

/// Position of a single field inside a fixed-width record.
///
/// Offsets are 0-based, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl FieldDefinition {
    /// Build a field from the 1-based, inclusive column numbers used by layout files.
    ///
    /// Callers are expected to have validated `first >= 1` and `first <= last`.
    pub fn from_one_based(name: impl Into<String>, first: usize, last: usize) -> Self {
        Self {
            name: name.into(),
            start: first.saturating_sub(1),
            end: last,
        }
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// Code → label table for a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueLabels {
    labels: BTreeMap<String, String>,
    numeric: HashMap<i64, String>,
}

impl ValueLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, label: impl Into<String>) {
        let code = code.into();
        let label = label.into();
        if let Ok(n) = code.trim().parse::<i64>() {
            self.numeric.entry(n).or_insert_with(|| label.clone());
        }
        self.labels.insert(code, label);
    }

    /// Label for a raw code.
    ///
    /// Exact matches win; otherwise an integral code matches by value, so `"1"` finds the label
    /// declared for `'01'`.
    pub fn label_for(&self, code: &str) -> Option<&str> {
        if let Some(label) = self.labels.get(code) {
            return Some(label.as_str());
        }
        let trimmed = code.trim();
        let n = trimmed.parse::<i64>().ok().or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| v as i64)
        })?;
        self.numeric.get(&n).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ValueLabels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

/// Field name → value-label table.
pub type ValueLabelMap = BTreeMap<String, ValueLabels>;

/// Field name → human readable description.
pub type VariableLabels = BTreeMap<String, String>;

/// Everything parsed from a layout specification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutSpec {
    /// Field positions, in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Value labels keyed by field name.
    pub value_labels: ValueLabelMap,
    /// Variable descriptions keyed by field name.
    pub variable_labels: VariableLabels,
}

impl LayoutSpec {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// One decoded fixed-width line: one trimmed value per layout field, `None` when blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub values: Vec<Option<String>>,
}

impl Record {
    /// Value of `name`, looked up through the layout the record was decoded with.
    pub fn get<'a>(&'a self, fields: &[FieldDefinition], name: &str) -> Option<&'a str> {
        let idx = fields.iter().position(|f| f.name == name)?;
        self.values.get(idx)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column name → type for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSchema {
    pub columns: Vec<(String, ColumnType)>,
}

impl FileSchema {
    pub fn new(columns: Vec<(String, ColumnType)>) -> Self {
        Self { columns }
    }
}

/// Reconciled column types across every file of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSchema {
    pub columns: BTreeMap<String, ColumnType>,
}

impl GlobalSchema {
    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_based_inclusive_range_becomes_half_open() {
        let f = FieldDefinition::from_one_based("AGE", 11, 13);
        assert_eq!(f.start, 10);
        assert_eq!(f.end, 13);
        assert_eq!(f.width(), 3);
    }

    #[test]
    fn value_labels_fall_back_to_numeric_codes() {
        let labels: ValueLabels = [("01", "White"), ("02", "Black"), ("X", "Unknown")]
            .into_iter()
            .collect();
        assert_eq!(labels.label_for("01"), Some("White"));
        assert_eq!(labels.label_for("1"), Some("White"));
        assert_eq!(labels.label_for("2.0"), Some("Black"));
        assert_eq!(labels.label_for("X"), Some("Unknown"));
        assert_eq!(labels.label_for("3"), None);
    }

    #[test]
    fn column_type_maps_polars_widths() {
        assert_eq!(ColumnType::from_polars(&DataType::Int32), ColumnType::Int64);
        assert_eq!(ColumnType::from_polars(&DataType::Float32), ColumnType::Float64);
        assert_eq!(ColumnType::from_polars(&DataType::String), ColumnType::Utf8);
        assert_eq!(ColumnType::from_polars(&DataType::Boolean), ColumnType::Bool);
    }
}
