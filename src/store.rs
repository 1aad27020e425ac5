//! In-memory record collections backed by a [`RecordStorage`].
//!
//! Every mutation follows the same sequence: validate, clone the affected
//! collection, apply the change to the clone, persist the clone, and only
//! then swap it in. A failed save leaves memory exactly as it was.
//!
//! Mutations start from a fresh load of the backing storage, so records
//! written by another process in the meantime are kept.

use crate::error::{PassError, RecordKind, Result};
use crate::expiry::{self, SweepOutcome};
use crate::records::{Employee, EmployeeUpdate, IssuedPass, PassStatus, PassType, validate_email};
use crate::storage::RecordStorage;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Employees, pass types and issued passes keyed by identifier.
pub struct RecordStore {
    storage: Box<dyn RecordStorage>,
    employees: BTreeMap<String, Employee>,
    pass_types: BTreeMap<String, PassType>,
    passes: BTreeMap<String, IssuedPass>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("employees", &self.employees.len())
            .field("pass_types", &self.pass_types.len())
            .field("passes", &self.passes.len())
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Load all collections from `storage`.
    ///
    /// Duplicate identifiers in the backing data collapse to the last row.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the storage cannot be read.
    pub fn open(storage: Box<dyn RecordStorage>) -> Result<Self> {
        let mut store = Self {
            storage,
            employees: BTreeMap::new(),
            pass_types: BTreeMap::new(),
            passes: BTreeMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Replace the in-memory collections with what storage holds now.
    ///
    /// Another process may have written the backing files since the last
    /// load; every mutation and sweep reloads first so it never writes a
    /// stale collection back.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the storage cannot be read; memory
    /// is left as it was.
    pub fn reload(&mut self) -> Result<()> {
        let set = self.storage.load()?;
        self.employees = set
            .employees
            .into_iter()
            .map(|e| (e.employee_id.clone(), e))
            .collect();
        self.pass_types = set
            .pass_types
            .into_iter()
            .map(|t| (t.pass_type_id.clone(), t))
            .collect();
        self.passes = set
            .passes
            .into_iter()
            .map(|p| (p.pass_id.clone(), p))
            .collect();
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn employees(&self) -> impl Iterator<Item = &Employee> {
        self.employees.values()
    }

    pub fn pass_types(&self) -> impl Iterator<Item = &PassType> {
        self.pass_types.values()
    }

    pub fn passes(&self) -> impl Iterator<Item = &IssuedPass> {
        self.passes.values()
    }

    pub fn employee(&self, employee_id: &str) -> Option<&Employee> {
        self.employees.get(employee_id)
    }

    pub fn pass_type(&self, pass_type_id: &str) -> Option<&PassType> {
        self.pass_types.get(pass_type_id)
    }

    pub fn pass(&self, pass_id: &str) -> Option<&IssuedPass> {
        self.passes.get(pass_id)
    }

    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }

    pub fn pass_type_count(&self) -> usize {
        self.pass_types.len()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    // ── Employees ────────────────────────────────────────────────────────────

    /// Add a new employee.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields or a duplicate id, `Persistence` on save failure.
    pub fn add_employee(&mut self, employee: Employee) -> Result<()> {
        employee.validate()?;
        self.reload()?;
        if self.employees.contains_key(&employee.employee_id) {
            return Err(PassError::Validation(format!(
                "employee '{}' already exists",
                employee.employee_id
            )));
        }

        let mut next = self.employees.clone();
        let id = employee.employee_id.clone();
        next.insert(id.clone(), employee);
        self.commit_employees(next)?;
        info!(employee_id = %id, "employee added");
        Ok(())
    }

    /// Remove an employee. Passes referencing it are left untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Persistence` on save failure.
    pub fn remove_employee(&mut self, employee_id: &str) -> Result<Employee> {
        self.reload()?;
        let mut next = self.employees.clone();
        let removed = next
            .remove(employee_id)
            .ok_or_else(|| PassError::not_found(RecordKind::Employee, employee_id))?;
        self.commit_employees(next)?;
        info!(employee_id, "employee removed");
        Ok(removed)
    }

    /// Apply a partial update to an employee.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Validation` for an empty update or bad values,
    /// `Persistence` on save failure.
    pub fn update_employee(
        &mut self,
        employee_id: &str,
        update: &EmployeeUpdate,
    ) -> Result<Employee> {
        if update.is_empty() {
            return Err(PassError::Validation("update has no fields".to_owned()));
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        self.reload()?;

        let mut next = self.employees.clone();
        let employee = next
            .get_mut(employee_id)
            .ok_or_else(|| PassError::not_found(RecordKind::Employee, employee_id))?;
        update.apply_to(employee);
        employee.validate()?;
        let updated = employee.clone();

        self.commit_employees(next)?;
        info!(employee_id, "employee updated");
        Ok(updated)
    }

    // ── Pass types ───────────────────────────────────────────────────────────

    /// Add a new pass type definition.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields or a duplicate id, `Persistence` on save failure.
    pub fn add_pass_type(&mut self, pass_type: PassType) -> Result<()> {
        pass_type.validate()?;
        self.reload()?;
        if self.pass_types.contains_key(&pass_type.pass_type_id) {
            return Err(PassError::Validation(format!(
                "pass type '{}' already exists",
                pass_type.pass_type_id
            )));
        }

        let mut next = self.pass_types.clone();
        let id = pass_type.pass_type_id.clone();
        next.insert(id.clone(), pass_type);
        self.commit_pass_types(next)?;
        info!(pass_type_id = %id, "pass type added");
        Ok(())
    }

    /// Remove a pass type definition. Issued passes keep their reference.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Persistence` on save failure.
    pub fn remove_pass_type(&mut self, pass_type_id: &str) -> Result<PassType> {
        self.reload()?;
        let mut next = self.pass_types.clone();
        let removed = next
            .remove(pass_type_id)
            .ok_or_else(|| PassError::not_found(RecordKind::PassType, pass_type_id))?;
        self.commit_pass_types(next)?;
        info!(pass_type_id, "pass type removed");
        Ok(removed)
    }

    // ── Passes ───────────────────────────────────────────────────────────────

    /// Issue a pass; the expiry date is derived from the pass type's validity.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown employee or pass type, `Validation` for an
    /// empty or duplicate pass id, `Persistence` on save failure.
    pub fn issue_pass(
        &mut self,
        pass_id: &str,
        employee_id: &str,
        pass_type_id: &str,
        issue_date: NaiveDate,
    ) -> Result<IssuedPass> {
        crate::records::require_non_empty("pass_id", pass_id)?;
        self.reload()?;
        if !self.employees.contains_key(employee_id) {
            return Err(PassError::not_found(RecordKind::Employee, employee_id));
        }
        let pass_type = self
            .pass_types
            .get(pass_type_id)
            .ok_or_else(|| PassError::not_found(RecordKind::PassType, pass_type_id))?;
        if self.passes.contains_key(pass_id) {
            return Err(PassError::Validation(format!("pass '{pass_id}' already exists")));
        }

        let issued = IssuedPass::issue(pass_id, employee_id, pass_type, issue_date)?;
        let mut next = self.passes.clone();
        next.insert(issued.pass_id.clone(), issued.clone());
        self.commit_passes(next)?;
        info!(
            pass_id,
            employee_id,
            pass_type_id,
            expiry_date = %issued.expiry_date,
            "pass issued"
        );
        Ok(issued)
    }

    /// Revoke a pass. Revoking an already revoked pass is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Validation` if the pass already expired,
    /// `Persistence` on save failure.
    pub fn revoke_pass(&mut self, pass_id: &str) -> Result<IssuedPass> {
        self.reload()?;
        let current = self
            .passes
            .get(pass_id)
            .ok_or_else(|| PassError::not_found(RecordKind::Pass, pass_id))?;
        match current.status {
            PassStatus::Revoked => return Ok(current.clone()),
            PassStatus::Expired => {
                return Err(PassError::Validation(format!(
                    "pass '{pass_id}' has already expired"
                )));
            }
            PassStatus::Active => {}
        }

        let mut next = self.passes.clone();
        let revoked = next
            .get_mut(pass_id)
            .map(|pass| {
                pass.status = PassStatus::Revoked;
                pass.clone()
            })
            .ok_or_else(|| PassError::not_found(RecordKind::Pass, pass_id))?;
        self.commit_passes(next)?;
        info!(pass_id, "pass revoked");
        Ok(revoked)
    }

    /// Reload, then flip stale `Active` passes to `Expired` and persist when
    /// anything changed.
    ///
    /// # Errors
    ///
    /// `Persistence` on load or save failure; memory is left unswept in that
    /// case.
    pub fn sweep_and_persist(&mut self, today: NaiveDate) -> Result<SweepOutcome> {
        self.reload()?;
        let mut next = self.passes.clone();
        let outcome = expiry::sweep_expirations(next.values_mut(), today);
        if outcome.changed.is_empty() {
            debug!(%today, "expiry sweep found nothing to flip");
            return Ok(outcome);
        }

        self.commit_passes(next)?;
        info!(%today, expired = outcome.changed_count(), "expiry sweep applied");
        Ok(outcome)
    }

    // ── Commit helpers ───────────────────────────────────────────────────────

    fn commit_employees(&mut self, next: BTreeMap<String, Employee>) -> Result<()> {
        let rows: Vec<Employee> = next.values().cloned().collect();
        self.storage.save_employees(&rows)?;
        self.employees = next;
        Ok(())
    }

    fn commit_pass_types(&mut self, next: BTreeMap<String, PassType>) -> Result<()> {
        let rows: Vec<PassType> = next.values().cloned().collect();
        self.storage.save_pass_types(&rows)?;
        self.pass_types = next;
        Ok(())
    }

    fn commit_passes(&mut self, next: BTreeMap<String, IssuedPass>) -> Result<()> {
        let rows: Vec<IssuedPass> = next.values().cloned().collect();
        self.storage.save_passes(&rows)?;
        self.passes = next;
        Ok(())
    }
}
