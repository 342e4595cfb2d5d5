#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const RECORD_LENGTH: usize = 1032;

/// A small NCDB-style layout: positions, labels and two format tables.
pub const LAYOUT_SAS: &str = r#"
/* Test layout modelled on the PUF label program. */
DATA ncdb;
  INFILE 'NCDBPUF_Breast.0.dat' LRECL=1032;
  INPUT
    PUF_CASE_ID          $ 1-10
    PUF_FACILITY_ID      $ 11-20
    AGE                  $ 21-23
    SEX                    24
    RACE                 $ 25-26
    YEAR_OF_DIAGNOSIS      27-30
    PRIMARY_SITE         $ 31-34
    HISTOLOGY              35-38
    ANALYTIC_STAGE_GROUP $ 39
    PUF_VITAL_STATUS       40
    CROWFLY                41-46
  ;
  LABEL
    AGE = 'Age at Diagnosis'
    SEX = 'Sex'
    RACE = 'Race'
    PRIMARY_SITE = 'Primary Site'
    YEAR_OF_DIAGNOSIS = 'Year of Diagnosis'
  ;
RUN;

PROC FORMAT;
  VALUE SEX 1='Male' 2='Female';
  VALUE $RACE '01'='White' '02'='Black' '99'='Unknown';
RUN;
"#;

/// One case of the test layout.
#[derive(Debug, Clone)]
pub struct Case<'a> {
    pub id: &'a str,
    pub age: &'a str,
    pub sex: &'a str,
    pub race: &'a str,
    pub year: &'a str,
    pub site: &'a str,
    pub histology: &'a str,
    pub stage: &'a str,
    pub vital_status: &'a str,
    pub crowfly: &'a str,
}

impl Default for Case<'_> {
    fn default() -> Self {
        Self {
            id: "0000000001",
            age: "45",
            sex: "1",
            race: "01",
            year: "2020",
            site: "C509",
            histology: "8140",
            stage: "1",
            vital_status: "1",
            crowfly: "12.5",
        }
    }
}

impl Case<'_> {
    /// Fixed-width line of exactly `RECORD_LENGTH` bytes.
    pub fn line(&self) -> String {
        let mut line = vec![b' '; RECORD_LENGTH];
        put(&mut line, 1, self.id);
        put(&mut line, 11, "FAC0000001");
        put(&mut line, 21, self.age);
        put(&mut line, 24, self.sex);
        put(&mut line, 25, self.race);
        put(&mut line, 27, self.year);
        put(&mut line, 31, self.site);
        put(&mut line, 35, self.histology);
        put(&mut line, 39, self.stage);
        put(&mut line, 40, self.vital_status);
        put(&mut line, 41, self.crowfly);
        String::from_utf8(line).unwrap()
    }
}

/// Write `value` left-aligned at 1-based column `first`.
fn put(line: &mut [u8], first: usize, value: &str) {
    let start = first - 1;
    line[start..start + value.len()].copy_from_slice(value.as_bytes());
}

pub fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("ncdb-tools-{name}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_layout(dir: &Path) -> PathBuf {
    let path = dir.join("NCDB_PUF_Labels.sas");
    fs::write(&path, LAYOUT_SAS).unwrap();
    path
}

/// Write a `.dat` file from cases plus any extra raw lines.
pub fn write_dat(dir: &Path, name: &str, cases: &[Case<'_>], extra_lines: &[&str]) -> PathBuf {
    let mut text = String::new();
    for case in cases {
        text.push_str(&case.line());
        text.push_str("\r\n");
    }
    for line in extra_lines {
        text.push_str(line);
        text.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Two PUF files whose `CROWFLY` and `AGE` columns infer to different types.
pub fn write_two_file_dataset(dir: &Path) {
    write_layout(dir);
    write_dat(
        dir,
        "NCDBPUF_Breast.0.dat",
        &[
            Case::default(),
            Case {
                id: "0000000002",
                age: "90+",
                sex: "2",
                race: "02",
                year: "2021",
                crowfly: "3",
                ..Case::default()
            },
        ],
        &["too short"],
    );
    write_dat(
        dir,
        "NCDBPUF_Brain.0.dat",
        &[
            Case {
                id: "0000000003",
                age: "61",
                site: "C729",
                histology: "9440",
                stage: "",
                vital_status: "",
                crowfly: "7",
                ..Case::default()
            },
            Case {
                id: "0000000004",
                age: "72",
                site: "C710",
                histology: "9440",
                year: "2019",
                crowfly: "8",
                ..Case::default()
            },
        ],
        &[],
    );
}
