//! Derived column rules.
//!
//! Each rule exists twice: as a Polars expression used by the transform pipeline, and as a
//! plain function over a single value. Both must agree.

use polars::prelude::*;

use crate::constants::{
    AGE_90_PLUS_SENTINEL, AGE_AS_INT_COLUMN, AGE_COLUMN, AGE_IS_90_PLUS_COLUMN, HISTOLOGY_COLUMN,
    HISTOLOGY_GROUP_COLUMN, PRIMARY_SITE_COLUMN, SITE_GROUP_COLUMN,
};

const OTHER_GROUP: &str = "Other";

/// Primary-site prefix → group. The first matching prefix wins.
pub const SITE_GROUP_RULES: &[(&str, &str)] = &[
    ("C50", "Breast"),
    ("C78", "Lymph Node"),
    ("C77", "Lymph Node"),
    ("C71", "Brain/CNS"),
    ("C72", "Brain/CNS"),
    ("C43", "Skin/Melanoma"),
    ("C44", "Skin/Melanoma"),
];

/// Histology prefix → group. The first matching prefix wins.
pub const HISTOLOGY_GROUP_RULES: &[(&str, &str)] = &[
    ("814", "Adenocarcinoma"),
    ("805", "Squamous Cell Carcinoma"),
    ("872", "Melanoma"),
    ("959", "Lymphoma"),
    ("967", "Lymphoma"),
];

/// Numeric age; `"90+"` becomes 90 and unparseable values are missing.
pub fn age_as_int(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw == AGE_90_PLUS_SENTINEL {
        Some(90)
    } else {
        raw.parse().ok()
    }
}

pub fn age_is_90_plus(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.trim() == AGE_90_PLUS_SENTINEL)
}

pub fn site_group(primary_site: Option<&str>) -> &'static str {
    group_by_prefix(primary_site, SITE_GROUP_RULES)
}

pub fn histology_group(histology: Option<&str>) -> &'static str {
    group_by_prefix(histology, HISTOLOGY_GROUP_RULES)
}

fn group_by_prefix(value: Option<&str>, rules: &[(&str, &'static str)]) -> &'static str {
    let Some(value) = value else {
        return OTHER_GROUP;
    };
    rules
        .iter()
        .find(|(prefix, _)| value.starts_with(prefix))
        .map_or(OTHER_GROUP, |(_, group)| *group)
}

/// `AGE` compared as text, so it works whether the column was typed as text or integer.
fn age_is_sentinel() -> Expr {
    col(AGE_COLUMN)
        .cast(DataType::String)
        .eq(lit(AGE_90_PLUS_SENTINEL))
}

pub fn age_as_int_expr() -> Expr {
    when(age_is_sentinel())
        .then(lit(90i64))
        .otherwise(col(AGE_COLUMN).cast(DataType::Int64))
        .alias(AGE_AS_INT_COLUMN)
}

pub fn age_is_90_plus_expr() -> Expr {
    when(age_is_sentinel())
        .then(lit(true))
        .otherwise(lit(false))
        .alias(AGE_IS_90_PLUS_COLUMN)
}

pub fn site_group_expr() -> Expr {
    prefix_group_expr(PRIMARY_SITE_COLUMN, SITE_GROUP_RULES).alias(SITE_GROUP_COLUMN)
}

pub fn histology_group_expr() -> Expr {
    prefix_group_expr(HISTOLOGY_COLUMN, HISTOLOGY_GROUP_RULES).alias(HISTOLOGY_GROUP_COLUMN)
}

/// Nested `when/then/otherwise` evaluating `rules` in order, `"Other"` when none match.
fn prefix_group_expr(column: &str, rules: &[(&str, &str)]) -> Expr {
    let value = col(column).cast(DataType::String);
    rules
        .iter()
        .rev()
        .fold(lit(OTHER_GROUP), |otherwise, (prefix, group)| {
            when(value.clone().str().starts_with(lit(*prefix)))
                .then(lit(*group))
                .otherwise(otherwise)
        })
}

/// Derivation expressions whose source columns are in `columns`.
pub fn derivations_for<'a, I>(columns: I) -> Vec<Expr>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut has_age = false;
    let mut has_site = false;
    let mut has_histology = false;
    for c in columns {
        match c {
            AGE_COLUMN => has_age = true,
            PRIMARY_SITE_COLUMN => has_site = true,
            HISTOLOGY_COLUMN => has_histology = true,
            _ => {}
        }
    }

    let mut exprs = Vec::new();
    if has_age {
        exprs.push(age_as_int_expr());
        exprs.push(age_is_90_plus_expr());
    }
    if has_site {
        exprs.push(site_group_expr());
    }
    if has_histology {
        exprs.push(histology_group_expr());
    }
    exprs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_rules() {
        assert_eq!(age_as_int(Some("45")), Some(45));
        assert_eq!(age_as_int(Some("90+")), Some(90));
        assert_eq!(age_as_int(Some("abc")), None);
        assert_eq!(age_as_int(None), None);
        assert!(age_is_90_plus(Some("90+")));
        assert!(!age_is_90_plus(Some("45")));
        assert!(!age_is_90_plus(None));
    }

    #[test]
    fn site_and_histology_groups() {
        assert_eq!(site_group(Some("C509")), "Breast");
        assert_eq!(site_group(Some("C729")), "Brain/CNS");
        assert_eq!(site_group(Some("C771")), "Lymph Node");
        assert_eq!(site_group(Some("C999")), "Other");
        assert_eq!(site_group(None), "Other");
        assert_eq!(histology_group(Some("8140")), "Adenocarcinoma");
        assert_eq!(histology_group(Some("9680")), "Other");
        assert_eq!(histology_group(Some("9670")), "Lymphoma");
    }

    #[test]
    fn expressions_match_row_functions() {
        let df = df![
            "AGE" => [Some("45"), Some("90+"), Some("abc"), None],
            "PRIMARY_SITE" => [Some("C509"), Some("C729"), Some("C999"), None],
            "HISTOLOGY" => [Some("8140"), Some("8050"), Some("8720"), Some("9590")],
        ]
        .unwrap();

        let out = df
            .lazy()
            .with_columns(derivations_for(["AGE", "PRIMARY_SITE", "HISTOLOGY"]))
            .collect()
            .unwrap();

        let ages: Vec<Option<i64>> = out.column("AGE_AS_INT").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(ages, vec![Some(45), Some(90), None, None]);

        let flags: Vec<Option<bool>> = out
            .column("AGE_IS_90_PLUS")
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(flags, vec![Some(false), Some(true), Some(false), Some(false)]);

        let sites: Vec<Option<&str>> = out.column("SITE_GROUP").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            sites,
            vec![Some("Breast"), Some("Brain/CNS"), Some("Other"), Some("Other")]
        );

        let hist: Vec<Option<&str>> = out
            .column("HISTOLOGY_GROUP")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            hist,
            vec![
                Some("Adenocarcinoma"),
                Some("Squamous Cell Carcinoma"),
                Some("Melanoma"),
                Some("Lymphoma"),
            ]
        );
    }

    #[test]
    fn derivations_skip_missing_sources() {
        assert_eq!(derivations_for(["AGE"]).len(), 2);
        assert!(derivations_for(["SEX"]).is_empty());
    }
}
