//! CSV files in a data directory, one file per collection.
//!
//! Saves go through a temp file that is synced and renamed over the target,
//! so a crash mid-write leaves the previous file intact.

use super::{RecordSet, RecordStorage, write_atomic};
use crate::error::{PassError, Result};
use crate::records::{Employee, IssuedPass, PassType};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const EMPLOYEES_FILE: &str = "employees.csv";
pub const PASS_TYPES_FILE: &str = "pass_types.csv";
pub const PASSES_FILE: &str = "safety_passes.csv";

const EMPLOYEE_HEADER: [&str; 5] = ["employee_id", "name", "email", "department", "manager"];
const PASS_TYPE_HEADER: [&str; 5] = [
    "pass_type_id",
    "name",
    "description",
    "category",
    "validity_period_days",
];
const PASS_HEADER: [&str; 6] = [
    "pass_id",
    "employee_id",
    "pass_type_id",
    "issue_date",
    "expiry_date",
    "status",
];

/// CSV-backed record storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct CsvStorage {
    data_dir: PathBuf,
}

impl CsvStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create the data directory and header-only files for any missing collection.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the directory or a file cannot be created.
    pub fn ensure_layout(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            PassError::Persistence(format!(
                "cannot create data directory '{}': {e}",
                self.data_dir.display()
            ))
        })?;

        if !self.path(EMPLOYEES_FILE).exists() {
            write_rows::<Employee>(&self.path(EMPLOYEES_FILE), &EMPLOYEE_HEADER, &[])?;
        }
        if !self.path(PASS_TYPES_FILE).exists() {
            write_rows::<PassType>(&self.path(PASS_TYPES_FILE), &PASS_TYPE_HEADER, &[])?;
        }
        if !self.path(PASSES_FILE).exists() {
            write_rows::<IssuedPass>(&self.path(PASSES_FILE), &PASS_HEADER, &[])?;
        }
        Ok(())
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

impl RecordStorage for CsvStorage {
    fn load(&self) -> Result<RecordSet> {
        let set = RecordSet {
            employees: read_rows(&self.path(EMPLOYEES_FILE))?,
            pass_types: read_rows(&self.path(PASS_TYPES_FILE))?,
            passes: read_rows(&self.path(PASSES_FILE))?,
        };
        debug!(
            employees = set.employees.len(),
            pass_types = set.pass_types.len(),
            passes = set.passes.len(),
            "loaded records from {}",
            self.data_dir.display()
        );
        Ok(set)
    }

    fn save_employees(&self, employees: &[Employee]) -> Result<()> {
        write_rows(&self.path(EMPLOYEES_FILE), &EMPLOYEE_HEADER, employees)
    }

    fn save_pass_types(&self, pass_types: &[PassType]) -> Result<()> {
        write_rows(&self.path(PASS_TYPES_FILE), &PASS_TYPE_HEADER, pass_types)
    }

    fn save_passes(&self, passes: &[IssuedPass]) -> Result<()> {
        write_rows(&self.path(PASSES_FILE), &PASS_HEADER, passes)
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(PassError::Persistence(format!(
                "cannot read '{}': {e}",
                path.display()
            )));
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes.as_slice());

    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| {
                PassError::Persistence(format!("malformed row in '{}': {e}", path.display()))
            })
        })
        .collect()
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let encode_err =
        |e: csv::Error| PassError::Persistence(format!("cannot encode '{}': {e}", path.display()));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(header).map_err(encode_err)?;
    for row in rows {
        writer.serialize(row).map_err(encode_err)?;
    }
    let bytes = writer.into_inner().map_err(|e| {
        PassError::Persistence(format!("cannot flush '{}': {e}", path.display()))
    })?;

    write_atomic(path, &bytes)
}
