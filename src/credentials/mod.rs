//! Secret storage for the mail relay password.
//!
//! The relay secret is referenced from config as a [`CredentialRef`]: either a
//! plaintext value or an entry in the platform credential store (Secret
//! Service, Keychain, Windows Credential Manager) accessed via `keyring`.

mod encrypted;
#[cfg(test)]
pub(crate) mod memory;
mod types;

pub use encrypted::EncryptedCredentialManager;
pub use types::{CredentialError, CredentialRef};

/// Manages secure storage and retrieval of credentials.
pub trait CredentialManager: Send + Sync {
    /// Store a credential securely and return a reference to it.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::StorageError` if the platform storage fails.
    fn store(&self, account: &str, value: &str) -> Result<CredentialRef, CredentialError>;

    /// Retrieve a credential's value using its reference.
    ///
    /// - `Ok(None)` for `CredentialRef::None`
    /// - `Ok(Some(value))` for `Plaintext` and for a present store entry
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::NotFound` if a store reference points to a missing entry.
    fn retrieve(&self, cred_ref: &CredentialRef) -> Result<Option<String>, CredentialError>;

    /// Delete a credential from secure storage. Missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::StorageError` if platform storage access fails.
    fn delete(&self, cred_ref: &CredentialRef) -> Result<(), CredentialError>;
}

/// Create the platform credential manager.
#[must_use]
pub fn create_manager() -> Box<dyn CredentialManager> {
    Box::new(EncryptedCredentialManager::new())
}
