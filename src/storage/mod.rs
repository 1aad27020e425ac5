//! Persistence collaborators for the three record collections.
//!
//! A [`RecordStorage`] loads all collections at once and saves each one as a
//! full overwrite. A missing backing resource reads as an empty collection.

mod csv_files;
mod memory;

pub use csv_files::{CsvStorage, EMPLOYEES_FILE, PASS_TYPES_FILE, PASSES_FILE};
pub use memory::MemoryStorage;

use crate::error::{PassError, Result};
use crate::records::{Employee, IssuedPass, PassType};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything a storage backend holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub employees: Vec<Employee>,
    pub pass_types: Vec<PassType>,
    pub passes: Vec<IssuedPass>,
}

/// Load/save contract for record persistence.
///
/// Implementations must be `Send + Sync` so the store can live behind a lock
/// shared between the scheduler task and front-ends.
pub trait RecordStorage: Send + Sync {
    /// Load all three collections.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if a resource exists but cannot be read
    /// or decoded.
    fn load(&self) -> Result<RecordSet>;

    /// Overwrite the persisted employee collection.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the collection cannot be written.
    fn save_employees(&self, employees: &[Employee]) -> Result<()>;

    /// Overwrite the persisted pass type collection.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the collection cannot be written.
    fn save_pass_types(&self, pass_types: &[PassType]) -> Result<()>;

    /// Overwrite the persisted issued pass collection.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the collection cannot be written.
    fn save_passes(&self, passes: &[IssuedPass]) -> Result<()>;
}

/// Write `bytes` to `path` via temp file → fsync → rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PassError::Persistence(format!(
                "cannot create directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        PassError::Persistence(format!(
            "cannot create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(bytes)
        .map_err(|e| PassError::Persistence(format!("cannot write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| PassError::Persistence(format!("cannot sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        PassError::Persistence(format!(
            "cannot rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
