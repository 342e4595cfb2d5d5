mod common;

use std::fs;

use ncdb_tools::dictionary::{DataDictionary, DictionaryFormat, DictionaryOptions, generate_data_dictionary};
use ncdb_tools::ingestion::parquet::write_parquet;
use ncdb_tools::layout::parse_layout;
use ncdb_tools::query::load_data;
use polars::prelude::*;

use common::{LAYOUT_SAS, RECORD_LENGTH, tmp_dir};

fn write_dataset(dir: &std::path::Path) {
    let mut df = df![
        "SEX" => [Some("1"), Some("2"), Some("2"), None],
        "AGE_AS_INT" => [Some(40i64), Some(90), Some(61), Some(72)],
        "YEAR_OF_DIAGNOSIS" => ["2019", "2020", "2020", "2021"],
        "_source_file" => ["a.dat", "a.dat", "a.dat", "a.dat"],
    ]
    .unwrap();
    write_parquet(&mut df, dir.join("NCDBPUF_Breast.0.parquet")).unwrap();
}

#[test]
fn writes_all_formats_with_labels_and_descriptions() {
    let dir = tmp_dir("dictionary");
    write_dataset(&dir);
    let out = dir.join("docs");
    let layout = parse_layout(LAYOUT_SAS, RECORD_LENGTH).unwrap();

    let paths =
        generate_data_dictionary(&dir, Some(&out), Some(&layout), &DictionaryOptions::default()).unwrap();

    let csv = fs::read_to_string(paths.csv.unwrap()).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("variable,type,description,missing_count,missing_pct"));
    assert!(csv.contains("2 (Female): 2; 1 (Male): 1"));
    assert!(!csv.contains("_source_file"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(paths.json.unwrap()).unwrap()).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    let sex = entries.iter().find(|e| e["variable"] == "SEX").unwrap();
    assert_eq!(sex["description"], "Sex");
    assert_eq!(sex["top_values"][0]["label"], "Female");
    assert_eq!(sex["missing_count"], 1);

    let html = fs::read_to_string(paths.html.unwrap()).unwrap();
    assert!(html.contains("searchInput"));
    assert!(html.contains("<td>AGE_AS_INT</td>"));
}

#[test]
fn statistics_follow_query_filters() {
    let dir = tmp_dir("dictionary-query");
    write_dataset(&dir);

    let query = load_data(&dir).unwrap().filter_by_year(&[2020]).unwrap();
    let dict = DataDictionary::from_query(&query, None, &DictionaryOptions::default()).unwrap();
    let age = dict.get("AGE_AS_INT").unwrap();
    assert_eq!(age.min, Some(61.0));
    assert_eq!(age.max, Some(90.0));
    assert_eq!(dict.get("SEX").unwrap().missing_count, Some(0));
}

#[test]
fn only_requested_formats_are_written() {
    let dir = tmp_dir("dictionary-formats");
    write_dataset(&dir);
    let opts = DictionaryOptions {
        formats: vec![DictionaryFormat::Json],
        ..DictionaryOptions::default()
    };

    let paths = generate_data_dictionary(&dir, None, None, &opts).unwrap();
    assert!(paths.csv.is_none() && paths.html.is_none());
    assert_eq!(paths.json.as_deref(), Some(dir.join("data_dictionary.json").as_path()));
}
