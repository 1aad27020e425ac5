//! Error types for safety pass tracking.

use crate::credentials::CredentialError;

/// Kind of record a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// An employee record.
    Employee,
    /// A pass type definition.
    PassType,
    /// An issued pass.
    Pass,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Employee => f.write_str("employee"),
            Self::PassType => f.write_str("pass type"),
            Self::Pass => f.write_str("pass"),
        }
    }
}

/// Top-level error type for the pass tracking system.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// Referenced record does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// What kind of record was looked up.
        kind: RecordKind,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Input rejected before any mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Backing storage unreadable or unwritable.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Mail relay reported a failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Secret could not be resolved.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Scheduler error (illegal transition, state persistence).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PassError {
    pub(crate) fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PassError>;
