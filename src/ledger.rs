// src/ledger.rs
//! The on-disk table of every attempted analysis.
//!
//! The ledger is a flat CSV keyed by `full_name`. Its column set is the union of
//! every column ever written: appending a record with a novel column back-fills
//! that column with an empty cell on all earlier rows. Each append rewrites the
//! whole file through a temp file and a rename.
//!
//! Writers inside one process are serialized by the store's guard. Nothing
//! protects against a second process writing the same file.

use crate::error::{HarvestError, Result};
use crate::types::{AnalysisStatus, ResultRecord};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const KEY_COLUMN: &str = "full_name";
pub const STATUS_COLUMN: &str = "analysis_status";

/// In-memory copy of the ledger with a uniform column set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl LedgerTable {
    /// Reads the ledger; an absent or empty file is an empty table.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        match fs::File::open(path) {
            Ok(file) => Self::from_reader(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(HarvestError::io(e, path)),
        }
    }

    /// Parses a ledger from CSV. Short legacy rows are padded with empty cells.
    ///
    /// # Errors
    /// Returns error on malformed CSV.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if columns.iter().all(String::is_empty) {
            columns.clear();
        }

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            while row.len() > columns.len() {
                let name = format!("extra_{}", columns.len());
                for earlier in &mut rows {
                    earlier.push(String::new());
                }
                columns.push(name);
            }
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Writes the table through a temp file and a rename.
    ///
    /// # Errors
    /// Returns error if the temp file cannot be written or renamed.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| HarvestError::io(e, parent))?;
        }
        let temp_path = temp_path_for(path);
        {
            let mut wtr = csv::Writer::from_path(&temp_path)?;
            if !self.columns.is_empty() {
                wtr.write_record(&self.columns)?;
            }
            for row in &self.rows {
                wtr.write_record(row)?;
            }
            wtr.flush().map_err(|e| HarvestError::io(e, &temp_path))?;
        }
        fs::rename(&temp_path, path).map_err(|e| HarvestError::io(e, path))
    }

    /// Appends a row, growing the column set as needed.
    pub fn push(&mut self, fields: &[(String, String)]) {
        for (key, _) in fields {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
        let mut row = vec![String::new(); self.columns.len()];
        for (key, value) in fields {
            if let Some(idx) = self.column_index(key) {
                row[idx].clone_from(value);
            }
        }
        self.rows.push(row);
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`, if both exist.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }

    /// Identifiers present in the ledger, whatever their status.
    #[must_use]
    pub fn identifiers(&self) -> HashSet<String> {
        let Some(idx) = self.column_index(KEY_COLUMN) else {
            return HashSet::new();
        };
        self.rows
            .iter()
            .filter_map(|r| r.get(idx))
            .filter(|id| !id.is_empty())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        let Some(idx) = self.column_index(KEY_COLUMN) else {
            return false;
        };
        self.rows.iter().any(|r| r.get(idx).is_some_and(|v| v == id))
    }

    /// Status of each row; rows without a status column count as unknown errors.
    #[must_use]
    pub fn statuses(&self) -> Vec<AnalysisStatus> {
        (0..self.rows.len())
            .map(|i| AnalysisStatus::from_tag(self.get(i, STATUS_COLUMN).unwrap_or("")))
            .collect()
    }

    /// Rows as column-name maps.
    #[must_use]
    pub fn rows(&self) -> Vec<HashMap<&str, &str>> {
        self.rows
            .iter()
            .map(|r| {
                self.columns
                    .iter()
                    .map(String::as_str)
                    .zip(r.iter().map(String::as_str))
                    .collect()
            })
            .collect()
    }

    /// Keeps rows for which `keep` returns true; returns how many were dropped.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&LedgerRow<'_>) -> bool) -> usize {
        let before = self.rows.len();
        let columns = &self.columns;
        self.rows.retain(|r| keep(&LedgerRow { columns, cells: r }));
        before - self.rows.len()
    }
}

/// Borrowed view of one ledger row.
pub struct LedgerRow<'a> {
    columns: &'a [String],
    cells: &'a [String],
}

impl LedgerRow<'_> {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.cells.get(idx).map(String::as_str)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Shared handle to the ledger file used by concurrent workers.
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl LedgerStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current table.
    ///
    /// # Errors
    /// Returns error if the ledger exists but is unreadable.
    pub fn load(&self) -> Result<LedgerTable> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        LedgerTable::read(&self.path)
    }

    /// Identifiers already recorded, success or failure alike.
    ///
    /// # Errors
    /// Returns error if the ledger exists but is unreadable.
    pub fn identifiers(&self) -> Result<HashSet<String>> {
        Ok(self.load()?.identifiers())
    }

    /// Persists one record: read, merge columns, rewrite.
    ///
    /// Returns `false` without writing when the identifier is already present.
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read or rewritten.
    pub fn append(&self, record: &ResultRecord) -> Result<bool> {
        self.append_fields(record.full_name(), &record.fields())
    }

    /// Like [`append`](Self::append) for an arbitrary row.
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read or rewritten.
    pub fn append_fields(&self, id: &str, fields: &[(String, String)]) -> Result<bool> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut table = LedgerTable::read(&self.path)?;
        if table.contains(id) {
            log::warn!("{id} is already in {}, not appending", self.path.display());
            return Ok(false);
        }
        table.push(fields);
        table.write_atomic(&self.path)?;
        log::debug!("Ledger {} now holds {} rows", self.path.display(), table.len());
        Ok(true)
    }

    /// Drops every non-success row so those repositories are retried.
    /// Returns how many rows were removed.
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read or rewritten.
    pub fn prune_failures(&self) -> Result<usize> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut table = LedgerTable::read(&self.path)?;
        let removed = table.retain_rows(|row| {
            AnalysisStatus::from_tag(row.get(STATUS_COLUMN).unwrap_or("")).is_success()
        });
        if removed > 0 {
            table.write_atomic(&self.path)?;
        }
        Ok(removed)
    }
}
