// src/candidates.rs
//! Loading of the master candidate list.

use crate::error::{HarvestError, Result};
use crate::types::Candidate;
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Columns every candidate list must carry.
pub const REQUIRED_COLUMNS: &[&str] = &["full_name", "stars", "forks", "age_years", "releases"];

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap_or_else(|_| panic!("Invalid Regex"))
});

/// Returns true for `owner/name` identifiers that are safe to use as directory names.
#[must_use]
pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER_RE.is_match(id) && !id.split('/').any(|part| part == "." || part == "..")
}

/// Loads the candidate list from a CSV file.
///
/// # Errors
/// Returns error if the file is missing, a required column is absent, or a row
/// carries an invalid identifier or numeric value.
pub fn load(path: &Path) -> Result<Vec<Candidate>> {
    let file = std::fs::File::open(path).map_err(|e| HarvestError::io(e, path))?;
    let candidates = from_reader(file)?;
    log::info!("Loaded {} candidates from {}", candidates.len(), path.display());
    Ok(candidates)
}

/// Parses a candidate list from any CSV source.
///
/// # Errors
/// See [`load`].
pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Candidate>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(HarvestError::Config(format!(
                "candidate list is missing required column '{required}'"
            )));
        }
    }

    let mut out = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = idx + 2;
        let fields: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        out.push(build_candidate(fields, line)?);
    }
    Ok(out)
}

fn build_candidate(fields: Vec<(String, String)>, line: usize) -> Result<Candidate> {
    let get = |key: &str| {
        fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    };

    let full_name = get("full_name").unwrap_or("").to_string();
    if !is_valid_identifier(&full_name) {
        return Err(HarvestError::Config(format!(
            "line {line}: invalid repository identifier '{full_name}'"
        )));
    }

    let stars = parse_count(get("stars"), "stars", line)?;
    let forks = parse_count(get("forks"), "forks", line)?;
    let releases = parse_count(get("releases"), "releases", line)?;
    let age_years = match get("age_years") {
        Some(v) => v.parse::<f64>().map_err(|_| bad_value("age_years", v, line))?,
        None => 0.0,
    };
    let primary_language = get("primary_language").map(str::to_string);
    let size_bytes = get("size_bytes").and_then(|v| v.parse::<u64>().ok());

    Ok(Candidate {
        full_name,
        stars,
        forks,
        age_years,
        releases,
        primary_language,
        size_bytes,
        fields,
    })
}

fn parse_count(value: Option<&str>, column: &str, line: usize) -> Result<u64> {
    let Some(v) = value else {
        return Ok(0);
    };
    // Snapshots written through dataframes sometimes carry "123.0".
    v.parse::<u64>()
        .or_else(|_| match v.parse::<f64>() {
            Ok(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
            _ => Err(()),
        })
        .map_err(|()| bad_value(column, v, line))
}

fn bad_value(column: &str, value: &str, line: usize) -> HarvestError {
    HarvestError::Config(format!("line {line}: invalid {column} value '{value}'"))
}
