//! In-memory record storage, used by tests and embedders.

use super::{RecordSet, RecordStorage};
use crate::error::{PassError, Result};
use crate::records::{Employee, IssuedPass, PassType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Storage that keeps the persisted collections in memory.
///
/// Clones share the same backing data, so a test can keep a handle and
/// inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<RecordSet>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record set.
    pub fn with_records(records: RecordSet) -> Self {
        Self {
            data: Arc::new(Mutex::new(records)),
            fail_writes: Arc::default(),
        }
    }

    /// Make every subsequent save fail with `PassError::Persistence`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of what has been persisted so far.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the lock is poisoned.
    pub fn snapshot(&self) -> Result<RecordSet> {
        self.lock().map(|data| data.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RecordSet>> {
        self.data
            .lock()
            .map_err(|_| PassError::Persistence("memory storage lock poisoned".to_owned()))
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PassError::Persistence("memory storage is read-only".to_owned()));
        }
        Ok(())
    }
}

impl RecordStorage for MemoryStorage {
    fn load(&self) -> Result<RecordSet> {
        self.snapshot()
    }

    fn save_employees(&self, employees: &[Employee]) -> Result<()> {
        self.check_writable()?;
        self.lock()?.employees = employees.to_vec();
        Ok(())
    }

    fn save_pass_types(&self, pass_types: &[PassType]) -> Result<()> {
        self.check_writable()?;
        self.lock()?.pass_types = pass_types.to_vec();
        Ok(())
    }

    fn save_passes(&self, passes: &[IssuedPass]) -> Result<()> {
        self.check_writable()?;
        self.lock()?.passes = passes.to_vec();
        Ok(())
    }
}
