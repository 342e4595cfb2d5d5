mod common;

use ncdb_tools::ingestion::parquet::{read_parquet, write_parquet};
use ncdb_tools::transform::{age_as_int, apply_transformations, histology_group, site_group};
use ncdb_tools::types::{ColumnType, ValueLabelMap};
use polars::prelude::*;

use common::tmp_dir;

#[test]
fn row_rules_match_reference_table() {
    assert_eq!(age_as_int(Some("45")), Some(45));
    assert_eq!(age_as_int(Some("90+")), Some(90));
    assert_eq!(age_as_int(Some("abc")), None);
    assert_eq!(age_as_int(None), None);

    assert_eq!(site_group(Some("C509")), "Breast");
    assert_eq!(site_group(Some("C729")), "Brain/CNS");
    assert_eq!(site_group(Some("C999")), "Other");
    assert_eq!(histology_group(Some("8050")), "Squamous Cell Carcinoma");
}

#[test]
fn directory_transform_reconciles_and_derives() {
    let dir = tmp_dir("transform-dir");
    let mut breast = df![
        "AGE" => ["45", "90+"],
        "SEX" => [1i64, 2],
        "PRIMARY_SITE" => ["C509", "C500"],
        "HISTOLOGY" => ["8140", "8500"],
        "CROWFLY" => [1.5f64, 3.0],
    ]
    .unwrap();
    let mut brain = df![
        "AGE" => [61i64, 72],
        "SEX" => [2i64, 9],
        "PRIMARY_SITE" => ["C729", "C710"],
        "HISTOLOGY" => ["9440", "9590"],
        "CROWFLY" => [7i64, 8],
    ]
    .unwrap();
    write_parquet(&mut breast, dir.join("NCDBPUF_Breast.0.parquet")).unwrap();
    write_parquet(&mut brain, dir.join("NCDBPUF_Brain.0.parquet")).unwrap();

    let mut labels = ValueLabelMap::new();
    labels.insert(
        "SEX".to_string(),
        [("1", "Male"), ("2", "Female")].into_iter().collect(),
    );

    let report = apply_transformations(&dir, &labels).unwrap();
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.global_schema.get("AGE"), Some(ColumnType::Utf8));
    assert_eq!(report.global_schema.get("CROWFLY"), Some(ColumnType::Float64));

    let brain = read_parquet(dir.join("NCDBPUF_Brain.0.parquet")).unwrap();
    assert_eq!(brain.column("AGE").unwrap().dtype(), &DataType::String);
    assert_eq!(brain.column("CROWFLY").unwrap().dtype(), &DataType::Float64);

    let groups: Vec<Option<&str>> = brain.column("SITE_GROUP").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(groups, vec![Some("Brain/CNS"), Some("Brain/CNS")]);
    let hist: Vec<Option<&str>> = brain
        .column("HISTOLOGY_GROUP")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(hist, vec![Some("Other"), Some("Lymphoma")]);
    let sex: Vec<Option<&str>> = brain.column("SEX_LABEL").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(sex, vec![Some("Female"), None]);

    let breast = read_parquet(dir.join("NCDBPUF_Breast.0.parquet")).unwrap();
    let ages: Vec<Option<i64>> = breast.column("AGE_AS_INT").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(ages, vec![Some(45), Some(90)]);
    let flags: Vec<Option<bool>> = breast
        .column("AGE_IS_90_PLUS")
        .unwrap()
        .bool()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(flags, vec![Some(false), Some(true)]);
}

#[test]
fn transforming_twice_is_stable() {
    let dir = tmp_dir("transform-twice");
    let mut df = df!["AGE" => ["45", "90+"], "PRIMARY_SITE" => ["C509", "C999"]].unwrap();
    write_parquet(&mut df, dir.join("a.parquet")).unwrap();

    apply_transformations(&dir, &ValueLabelMap::new()).unwrap();
    let once = read_parquet(dir.join("a.parquet")).unwrap();
    apply_transformations(&dir, &ValueLabelMap::new()).unwrap();
    let twice = read_parquet(dir.join("a.parquet")).unwrap();
    assert!(once.equals_missing(&twice));
}
