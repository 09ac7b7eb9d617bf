// src/summary.rs
//! Reduction of the tool's per-class table into per-repository statistics.
//!
//! The table is first read as strict CSV. Free-text columns in some tool
//! versions contain unquoted commas, which breaks strict parsing; the tolerant
//! path then splits each line on commas and keeps only lines whose second
//! field is an integer.

use crate::error::{HarvestError, Result};
use crate::types::{MetricsSummary, Stat};
use std::fs;
use std::path::Path;

/// Metric columns the table must provide, in `ClassRow` order.
pub const METRIC_COLUMNS: [&str; 4] = ["cbo", "dit", "lcom", "loc"];

/// Metrics of one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassRow {
    pub cbo: f64,
    pub dit: f64,
    pub lcom: f64,
    pub loc: f64,
}

impl ClassRow {
    fn from_values(v: [f64; 4]) -> Self {
        Self {
            cbo: v[0],
            dit: v[1],
            lcom: v[2],
            loc: v[3],
        }
    }
}

/// Why strict parsing gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictParseError(pub String);

impl std::fmt::Display for StrictParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the table as well-formed CSV with a header naming every metric column.
///
/// # Errors
/// Fails on ragged rows, missing metric columns or non-numeric metric cells.
pub fn parse_strict(content: &str) -> std::result::Result<Vec<ClassRow>, StrictParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| StrictParseError(e.to_string()))?
        .clone();
    let positions = metric_positions(headers.iter())
        .ok_or_else(|| StrictParseError("header lacks a metric column".into()))?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| StrictParseError(e.to_string()))?;
        let mut values = [0.0; 4];
        for (slot, &pos) in values.iter_mut().zip(&positions) {
            let cell = record.get(pos).unwrap_or("");
            *slot = parse_metric(cell).ok_or_else(|| {
                StrictParseError(format!("non-numeric metric '{cell}' on line {}", line_of(&record)))
            })?;
        }
        rows.push(ClassRow::from_values(values));
    }
    Ok(rows)
}

/// Line-oriented reconstruction for tables strict parsing rejects.
///
/// The first line naming every metric column (quotes around names ignored)
/// fixes the column positions. Any
/// other line is kept only when its second field is an integer and every metric
/// cell at those positions is numeric.
#[must_use]
pub fn parse_tolerant(content: &str) -> Vec<ClassRow> {
    let mut positions: Option<[usize; 4]> = None;
    let mut rows = Vec::new();

    for line in content.lines() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let Some(pos) = positions else {
            positions = metric_positions(fields.iter().copied());
            continue;
        };
        if !fields.get(1).is_some_and(|f| f.parse::<i64>().is_ok()) {
            continue;
        }
        let mut values = [0.0; 4];
        let complete = values.iter_mut().zip(pos).all(|(slot, p)| {
            match fields.get(p).and_then(|cell| parse_metric(cell)) {
                Some(v) => {
                    *slot = v;
                    true
                }
                None => false,
            }
        });
        if complete {
            rows.push(ClassRow::from_values(values));
        }
    }
    rows
}

/// Aggregates rows; `None` when there are none.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_rows(rows: &[ClassRow]) -> Option<MetricsSummary> {
    if rows.is_empty() {
        return None;
    }
    let column = |f: fn(&ClassRow) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
    let loc = column(|r| r.loc);
    let total_loc: f64 = loc.iter().sum();

    Some(MetricsSummary {
        total_classes: rows.len(),
        cbo: stat(&column(|r| r.cbo)),
        dit: stat(&column(|r| r.dit)),
        lcom: stat(&column(|r| r.lcom)),
        total_loc,
        avg_loc_per_class: total_loc / rows.len() as f64,
    })
}

/// Reads and aggregates a tool output file, falling back to tolerant parsing.
///
/// # Errors
/// Returns `ParseFailed` if the file cannot be read.
pub fn summarize_file(path: &Path) -> Result<Option<MetricsSummary>> {
    let bytes = fs::read(path).map_err(|e| HarvestError::ParseFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let content = String::from_utf8_lossy(&bytes);

    Ok(summarize_rows(&parse_content(&content, path)))
}

/// Strict parse first; the line fallback when that fails or finds no rows.
fn parse_content(content: &str, path: &Path) -> Vec<ClassRow> {
    match parse_strict(content) {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) => parse_tolerant(content),
        Err(e) => {
            log::debug!("Strict parse of {} failed ({e}), using line fallback", path.display());
            parse_tolerant(content)
        }
    }
}

/// Mean, median, sample standard deviation and max.
/// A single value has no spread; its deviation is reported as zero.
#[allow(clippy::cast_precision_loss)]
fn stat(values: &[f64]) -> Stat {
    let n = values.len();
    if n == 0 {
        return Stat::default();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n < 2 {
        0.0
    } else {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    };
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    let max = sorted[n - 1];
    Stat { mean, median, std, max }
}

fn metric_positions<'a>(headers: impl Iterator<Item = &'a str>) -> Option<[usize; 4]> {
    let names: Vec<String> = headers
        .map(|h| h.trim().trim_matches('"').trim().to_ascii_lowercase())
        .collect();
    let mut out = [0; 4];
    for (slot, want) in out.iter_mut().zip(METRIC_COLUMNS) {
        *slot = names.iter().position(|n| n == want)?;
    }
    Some(out)
}

/// Finite numbers only; the tool prints `NaN` for undefined cohesion.
fn parse_metric(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}
