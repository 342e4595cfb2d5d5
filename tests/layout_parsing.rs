mod common;

use std::fs;

use ncdb_tools::NcdbError;
use ncdb_tools::layout::{load_layout, parse_layout};

use common::{LAYOUT_SAS, RECORD_LENGTH, tmp_dir, write_layout};

#[test]
fn sas_layout_yields_fields_labels_and_descriptions() {
    let dir = tmp_dir("layout");
    let path = write_layout(&dir);

    let layout = load_layout(&path, None, RECORD_LENGTH).unwrap();
    assert_eq!(layout.fields.len(), 11);

    let age = layout.fields.iter().find(|f| f.name == "AGE").unwrap();
    assert_eq!((age.start, age.end), (20, 23));
    let sex = layout.fields.iter().find(|f| f.name == "SEX").unwrap();
    assert_eq!((sex.start, sex.end), (23, 24));

    assert_eq!(layout.value_labels["SEX"].label_for("2"), Some("Female"));
    assert_eq!(layout.value_labels["RACE"].label_for("01"), Some("White"));
    assert_eq!(layout.value_labels["RACE"].label_for("1"), Some("White"));
    assert_eq!(layout.variable_labels["AGE"], "Age at Diagnosis");
}

#[test]
fn every_field_lies_within_the_record() {
    let layout = parse_layout(LAYOUT_SAS, RECORD_LENGTH).unwrap();
    for f in &layout.fields {
        assert!(f.start < f.end, "{f:?}");
        assert!(f.end <= RECORD_LENGTH, "{f:?}");
    }
}

#[test]
fn comment_statement_with_apostrophe_does_not_swallow_the_layout() {
    let text = "* Patient's age at diagnosis;\nDATA x;\nINPUT AGE $ 1-3 SEX 4;\nRUN;\n";
    let layout = parse_layout(text, 4).unwrap();

    let positions: Vec<_> = layout
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.start, f.end))
        .collect();
    assert_eq!(positions, vec![("AGE", 0, 3), ("SEX", 3, 4)]);
}

#[test]
fn column_override_replaces_positions_but_keeps_labels() {
    let dir = tmp_dir("layout-override");
    let sas = write_layout(&dir);
    let csv = dir.join("columns.csv");
    fs::write(&csv, "name,start,end\nSEX,1,1\nAGE,2,4\n").unwrap();

    let layout = load_layout(&sas, Some(&csv), RECORD_LENGTH).unwrap();
    let names: Vec<&str> = layout.field_names().collect();
    assert_eq!(names, vec!["SEX", "AGE"]);
    assert_eq!((layout.fields[1].start, layout.fields[1].end), (1, 4));
    assert_eq!(layout.value_labels["SEX"].label_for("1"), Some("Male"));
}

#[test]
fn override_with_non_numeric_position_is_a_format_error() {
    let dir = tmp_dir("layout-bad-override");
    let sas = write_layout(&dir);
    let csv = dir.join("columns.csv");
    fs::write(&csv, "name,start,end\nSEX,one,1\n").unwrap();

    let err = load_layout(&sas, Some(&csv), RECORD_LENGTH).unwrap_err();
    assert!(matches!(err, NcdbError::Format { .. }));
    assert!(err.to_string().contains("non-numeric start position"), "{err}");
}

#[test]
fn overlapping_or_oversized_layouts_are_rejected() {
    let overlap = "INPUT A $ 1-5 B $ 5-8;";
    let err = parse_layout(overlap, RECORD_LENGTH).unwrap_err();
    assert!(err.to_string().contains("overlaps"), "{err}");

    let too_long = "INPUT A $ 1-1033;";
    let err = parse_layout(too_long, RECORD_LENGTH).unwrap_err();
    assert!(err.to_string().contains("beyond record length"), "{err}");
}

#[test]
fn missing_layout_aborts() {
    let dir = tmp_dir("layout-missing");
    let err = load_layout(dir.join("absent.sas"), None, RECORD_LENGTH).unwrap_err();
    assert!(matches!(err, NcdbError::Format { .. }));
}
