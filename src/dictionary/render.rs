//! Dictionary writers: CSV, JSON and a standalone searchable HTML page.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::{DataDictionary, DictionaryEntry};
use crate::error::NcdbResult;

/// Flat CSV row; top values are joined into a single cell.
#[derive(Serialize)]
struct CsvRow<'a> {
    variable: &'a str,
    #[serde(rename = "type")]
    data_type: &'a str,
    description: &'a str,
    missing_count: Option<u64>,
    missing_pct: Option<f64>,
    unique_values: Option<u64>,
    min: Option<f64>,
    max: Option<f64>,
    mean: Option<f64>,
    median: Option<f64>,
    top_values: String,
}

impl<'a> From<&'a DictionaryEntry> for CsvRow<'a> {
    fn from(e: &'a DictionaryEntry) -> Self {
        Self {
            variable: &e.variable,
            data_type: &e.data_type,
            description: &e.description,
            missing_count: e.missing_count,
            missing_pct: e.missing_pct,
            unique_values: e.unique_values,
            min: e.min,
            max: e.max,
            mean: e.mean,
            median: e.median,
            top_values: e.top_values_summary(),
        }
    }
}

pub fn write_csv(dictionary: &DataDictionary, path: impl AsRef<Path>) -> NcdbResult<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for entry in &dictionary.entries {
        wtr.serialize(CsvRow::from(entry))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pretty-printed JSON array of entries, with top values nested.
pub fn write_json(dictionary: &DataDictionary, path: impl AsRef<Path>) -> NcdbResult<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut out, &dictionary.entries)?;
    out.flush()?;
    Ok(())
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>NCDB Data Dictionary</title>
<style>
body { font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }
h1 { color: #333; border-bottom: 2px solid #4CAF50; padding-bottom: 10px; }
table { border-collapse: collapse; width: 100%; background-color: white; }
th { background-color: #4CAF50; color: white; padding: 12px; text-align: left; position: sticky; top: 0; }
td { padding: 10px; border-bottom: 1px solid #ddd; }
tr:hover { background-color: #f5f5f5; }
.numeric { text-align: right; }
.missing-high { color: #d32f2f; font-weight: bold; }
.description { font-style: italic; color: #666; }
.search-box { margin: 20px 0; padding: 10px; width: 300px; font-size: 16px; }
</style>
<script>
function filterTable() {
  var filter = document.getElementById("searchInput").value.toUpperCase();
  var rows = document.getElementById("dataTable").getElementsByTagName("tr");
  for (var i = 1; i < rows.length; i++) {
    var cell = rows[i].getElementsByTagName("td")[0];
    if (cell) {
      var text = cell.textContent || cell.innerText;
      rows[i].style.display = text.toUpperCase().indexOf(filter) > -1 ? "" : "none";
    }
  }
}
</script>
</head>
<body>
<h1>NCDB Data Dictionary</h1>
<input type="text" id="searchInput" class="search-box" onkeyup="filterTable()" placeholder="Search for variables...">
<table id="dataTable">
<thead>
<tr>"#;

const HTML_COLUMNS: [&str; 11] = [
    "Variable",
    "Type",
    "Description",
    "Missing Count",
    "Missing Pct",
    "Unique Values",
    "Min",
    "Max",
    "Mean",
    "Median",
    "Top Values",
];

/// Missing percentages above this are highlighted.
const MISSING_HIGHLIGHT_PCT: f64 = 50.0;

pub fn write_html(dictionary: &DataDictionary, path: impl AsRef<Path>) -> NcdbResult<()> {
    fs::write(path.as_ref(), render_html(dictionary))?;
    Ok(())
}

fn render_html(dictionary: &DataDictionary) -> String {
    let mut html = String::from(HTML_HEAD);
    for name in HTML_COLUMNS {
        let _ = write!(html, "<th>{name}</th>");
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for e in &dictionary.entries {
        html.push_str("<tr>");
        text_cell(&mut html, None, &e.variable);
        text_cell(&mut html, None, &e.data_type);
        text_cell(&mut html, Some("description"), &e.description);
        numeric_cell(&mut html, "numeric", e.missing_count.map(|v| v.to_string()));
        let missing_class = match e.missing_pct {
            Some(p) if p > MISSING_HIGHLIGHT_PCT => "numeric missing-high",
            _ => "numeric",
        };
        numeric_cell(&mut html, missing_class, e.missing_pct.map(|p| format!("{p}%")));
        numeric_cell(&mut html, "numeric", e.unique_values.map(|v| v.to_string()));
        for v in [e.min, e.max, e.mean, e.median] {
            numeric_cell(&mut html, "numeric", v.map(|v| v.to_string()));
        }
        text_cell(&mut html, None, &e.top_values_summary());
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}

fn text_cell(html: &mut String, class: Option<&str>, value: &str) {
    match class {
        Some(class) => {
            let _ = write!(html, "<td class=\"{class}\">{}</td>", html_escape(value));
        }
        None => {
            let _ = write!(html, "<td>{}</td>", html_escape(value));
        }
    }
}

fn numeric_cell(html: &mut String, class: &str, value: Option<String>) {
    let _ = write!(html, "<td class=\"{class}\">{}</td>", value.unwrap_or_default());
}

/// Escape `&`, `<`, `>`, `"` and `'` for HTML text and attribute values.
pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::TopValue;

    fn entry() -> DictionaryEntry {
        DictionaryEntry {
            variable: "SEX".to_string(),
            data_type: "String".to_string(),
            description: "Sex <at diagnosis>".to_string(),
            missing_count: Some(6),
            missing_pct: Some(60.0),
            unique_values: Some(3),
            min: None,
            max: None,
            mean: None,
            median: None,
            top_values: vec![TopValue {
                value: "1".to_string(),
                label: Some("Male".to_string()),
                count: 4,
            }],
        }
    }

    #[test]
    fn html_escapes_text_and_flags_high_missingness() {
        let html = render_html(&DataDictionary {
            entries: vec![entry()],
        });
        assert!(html.contains("Sex &lt;at diagnosis&gt;"));
        assert!(html.contains("numeric missing-high"));
        assert!(html.contains("id=\"searchInput\""));
        assert!(html.contains("1 (Male): 4"));
    }

    #[test]
    fn escape_covers_quotes() {
        assert_eq!(html_escape(r#"a&"b'"#), "a&amp;&quot;b&#39;");
    }
}
