//! Record types: employees, pass type definitions and issued passes.
//!
//! Field names double as the CSV header names, so renaming a field changes
//! the on-disk format.

use crate::error::{PassError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar date format used on disk and on the command line.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A person who can hold safety passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Stable unique key.
    pub employee_id: String,
    /// Display name.
    pub name: String,
    /// Contact address reminders are sent to.
    pub email: String,
    /// Organizational unit.
    pub department: String,
    /// Supervisor, free text.
    pub manager: String,
}

/// Partial update of an employee. Only fields that are `Some` change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub manager: Option<String>,
}

impl EmployeeUpdate {
    /// Returns `true` when no field is present.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.department.is_none()
            && self.manager.is_none()
    }

    /// Apply the present fields to `employee`.
    pub fn apply_to(&self, employee: &mut Employee) {
        if let Some(name) = &self.name {
            employee.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            employee.email.clone_from(email);
        }
        if let Some(department) = &self.department {
            employee.department.clone_from(department);
        }
        if let Some(manager) = &self.manager {
            employee.manager.clone_from(manager);
        }
    }
}

/// A category of credential and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassType {
    /// Unique key (e.g. `"HOT_WORK"`).
    pub pass_type_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Validity in whole days, always positive.
    pub validity_period_days: u32,
}

/// Lifecycle state of an issued pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Active,
    Expired,
    Revoked,
}

impl PassStatus {
    /// Lowercase name as stored on disk.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// `Expired` and `Revoked` never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A pass issued to one employee for one pass type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedPass {
    pub pass_id: String,
    pub employee_id: String,
    pub pass_type_id: String,
    pub issue_date: NaiveDate,
    /// Fixed at issuance; later pass type edits do not move it.
    pub expiry_date: NaiveDate,
    pub status: PassStatus,
}

impl IssuedPass {
    /// Issue a new active pass, deriving the expiry date from the pass type.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Validation` if the validity period is zero or the
    /// expiry date would overflow the calendar.
    pub fn issue(
        pass_id: impl Into<String>,
        employee_id: impl Into<String>,
        pass_type: &PassType,
        issue_date: NaiveDate,
    ) -> Result<Self> {
        if pass_type.validity_period_days == 0 {
            return Err(PassError::Validation(format!(
                "pass type '{}' has a non-positive validity period",
                pass_type.pass_type_id
            )));
        }
        let expiry_date = issue_date
            .checked_add_days(Days::new(u64::from(pass_type.validity_period_days)))
            .ok_or_else(|| {
                PassError::Validation(format!("expiry date out of range for {issue_date}"))
            })?;

        Ok(Self {
            pass_id: pass_id.into(),
            employee_id: employee_id.into(),
            pass_type_id: pass_type.pass_type_id.clone(),
            issue_date,
            expiry_date,
            status: PassStatus::Active,
        })
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns `PassError::Validation` for anything else.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| {
        PassError::Validation(format!("invalid date '{raw}' (expected YYYY-MM-DD): {e}"))
    })
}

/// Reject empty or whitespace-only required fields.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PassError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Check that `address` is a well-formed mailbox address.
///
/// # Errors
///
/// Returns `PassError::Validation` when the address does not parse.
pub fn validate_email(address: &str) -> Result<()> {
    address
        .trim()
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|e| PassError::Validation(format!("invalid email address '{address}': {e}")))
}

impl Employee {
    /// Validate required fields and the contact address.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Validation` on the first offending field.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("employee_id", &self.employee_id)?;
        require_non_empty("name", &self.name)?;
        validate_email(&self.email)
    }
}

impl PassType {
    /// Validate required fields and the validity period.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Validation` on the first offending field.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("pass_type_id", &self.pass_type_id)?;
        require_non_empty("name", &self.name)?;
        if self.validity_period_days == 0 {
            return Err(PassError::Validation(
                "validity_period_days must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}
