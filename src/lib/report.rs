//! Writing command reports to TSV tables and JSON files.
//!
//! Every report is also appended to the output footer as a step report; the functions here
//! are for the standalone `--report` / `--json-report` outputs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Write report rows to a TSV file with consistent error handling.
///
/// # Example
/// ```no_run
/// use clonekit_lib::report::write_tsv;
/// use serde::Serialize;
/// use std::path::Path;
///
/// #[derive(Serialize)]
/// struct Row {
///     chain: String,
///     total: u64,
/// }
///
/// let rows = vec![Row { chain: "TRB".to_string(), total: 10 }];
/// write_tsv(Path::new("usage.tsv"), &rows, "chain usage").unwrap();
/// ```
pub fn write_tsv<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T], description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default()
        .write_tsv(&path_ref, rows)
        .with_context(|| format!("Failed to write {} report: {}", description, path_ref.display()))
}

/// Write a report as pretty-printed JSON.
pub fn write_json<P: AsRef<Path>, R: Serialize>(path: P, report: &R) -> Result<()> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref)
        .with_context(|| format!("Failed to create JSON report: {}", path_ref.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, report)
        .with_context(|| format!("Failed to write JSON report: {}", path_ref.display()))?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Render a report as a pretty-printed JSON string, e.g. for stdout.
pub fn to_json_string<R: Serialize>(report: &R) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// One `field\tvalue` line of a flattened report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub field: String,
    pub value: String,
}

/// Flattens a report into rows; nested fields are joined with `.`.
pub fn report_rows<R: Serialize>(report: &R) -> Result<Vec<ReportRow>> {
    fn flatten(prefix: &str, value: &Value, rows: &mut Vec<ReportRow>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let name = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                    flatten(&name, child, rows);
                }
            }
            Value::String(s) => rows.push(ReportRow { field: prefix.to_string(), value: s.clone() }),
            other => rows.push(ReportRow { field: prefix.to_string(), value: other.to_string() }),
        }
    }
    let value = serde_json::to_value(report).context("Failed to serialize report")?;
    let mut rows = Vec::new();
    flatten("", &value, &mut rows);
    Ok(rows)
}
