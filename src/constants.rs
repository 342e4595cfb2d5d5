//! Fixed facts about the NCDB PUF record format and its well-known columns.

/// Length in bytes of one PUF record line (without the line terminator).
pub const NCDB_RECORD_LENGTH: usize = 1032;

pub const DATA_FILE_EXTENSION: &str = "dat";
pub const LAYOUT_FILE_EXTENSION: &str = "sas";
pub const COLUMNS_FILE_EXTENSION: &str = "csv";
pub const PARQUET_EXTENSION: &str = "parquet";

/// Records decoded before a batch is flushed into a dataframe.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Rows sampled per column when computing dictionary statistics.
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

/// Columns analysed together when computing dictionary statistics.
pub const DEFAULT_DICTIONARY_BATCH_SIZE: usize = 50;

/// Row count above which `collect()` reports a [`crate::query::LargeResultWarning`].
pub const LARGE_RESULT_ROWS: usize = 1_000_000;

pub const DEFAULT_MEMORY_LIMIT: &str = "4GB";

pub const YEAR_COLUMN: &str = "YEAR_OF_DIAGNOSIS";
pub const PRIMARY_SITE_COLUMN: &str = "PRIMARY_SITE";
pub const HISTOLOGY_COLUMN: &str = "HISTOLOGY";
pub const STAGE_COLUMN: &str = "ANALYTIC_STAGE_GROUP";
pub const VITAL_STATUS_COLUMN: &str = "PUF_VITAL_STATUS";
pub const AGE_COLUMN: &str = "AGE";

pub const AGE_AS_INT_COLUMN: &str = "AGE_AS_INT";
pub const AGE_IS_90_PLUS_COLUMN: &str = "AGE_IS_90_PLUS";
pub const SITE_GROUP_COLUMN: &str = "SITE_GROUP";
pub const HISTOLOGY_GROUP_COLUMN: &str = "HISTOLOGY_GROUP";
pub const LABEL_SUFFIX: &str = "_LABEL";

/// Provenance columns attached to every decoded row.
pub const TUMOR_TYPE_COLUMN: &str = "_tumor_type";
pub const SOURCE_FILE_COLUMN: &str = "_source_file";

/// Sentinel written by the registry for patients aged 90 or older.
pub const AGE_90_PLUS_SENTINEL: &str = "90+";

/// Fallback tumor type when a file name does not follow the PUF naming pattern.
pub const UNKNOWN_TUMOR_TYPE: &str = "Unknown";

/// Columns whose values look numeric but are identifiers or categorical codes.
///
/// These always resolve to text, whatever the per-file inference saw.
pub const NEVER_NUMERIC_COLUMNS: &[&str] = &[
    "PUF_CASE_ID",
    "PUF_FACILITY_ID",
    "PRIMARY_SITE",
    "HISTOLOGY",
    "HISTOLOGY_ICDO3",
    "BEHAVIOR",
    "LATERALITY",
    "CLASS_OF_CASE",
    "YEAR_OF_DIAGNOSIS",
    "SEQUENCE_NUMBER",
    "FACILITY_TYPE_CD",
    "FACILITY_LOCATION_CD",
    "ZIP",
];

pub fn is_never_numeric(column: &str) -> bool {
    NEVER_NUMERIC_COLUMNS.contains(&column)
}

pub const DEMOGRAPHIC_COLUMNS: &[&str] = &[
    "PUF_CASE_ID",
    "AGE",
    "SEX",
    "RACE",
    "SPANISH_HISPANIC_ORIGIN",
    "INSURANCE_STATUS",
    "CDCC_TOTAL_BEST",
    "MED_INC_QUAR_00",
    "NO_HSD_QUAR_00",
    "UR_CD_03",
    "MED_INC_QUAR_12",
    "NO_HSD_QUAR_12",
    "UR_CD_13",
    "MED_INC_QUAR_2016",
    "NO_HSD_QUAR_2016",
    "MED_INC_QUAR_2020",
    "NO_HSD_QUAR_2020",
    "CROWFLY",
];

pub const TREATMENT_COLUMNS: &[&str] = &[
    "RX_SUMM_SURG_PRIM_SITE",
    "RX_SUMM_CHEMO",
    "RX_SUMM_HORMONE",
    "RX_SUMM_IMMUNOTHERAPY",
    "RX_SUMM_TRNSPLNT_ENDO",
    "RX_SUMM_SYSTEMIC_SUR_SEQ",
    "RX_SUMM_TREATMENT_STATUS",
    "RX_SUMM_SCOPE_REG_LN_SUR",
    "RX_SUMM_SURG_OTH_REGDIS",
    "RX_SUMM_SURGICAL_MARGINS",
    "RAD_LOCATION_OF_RX",
    "RX_SUMM_SURGRAD_SEQ",
    "RAD_ELAPSED_RX_DAYS",
    "REASON_FOR_NO_RADIATION",
    "REASON_FOR_NO_SURGERY",
];

pub const OUTCOME_COLUMNS: &[&str] = &[
    "PUF_VITAL_STATUS",
    "DX_LASTCONTACT_DEATH_MONTHS",
    "PUF_30_DAY_MORT_CD",
    "PUF_90_DAY_MORT_CD",
    "READM_HOSP_30_DAYS",
    "PALLIATIVE_CARE",
];
