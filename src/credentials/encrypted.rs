//! Platform credential store backed by the `keyring` crate.

use super::{CredentialError, CredentialManager, CredentialRef};

/// Service name for all SafePass credentials in the platform credential store.
pub const SERVICE_NAME: &str = "safepass-credentials";

/// Credential manager using platform-specific encrypted storage via `keyring`.
#[derive(Debug, Default)]
pub struct EncryptedCredentialManager;

impl EncryptedCredentialManager {
    /// Create a new encrypted credential manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn entry(service: &str, account: &str) -> Result<keyring::Entry, CredentialError> {
    keyring::Entry::new(service, account).map_err(|e| {
        CredentialError::StorageError(format!("failed to create keyring entry: {e}"))
    })
}

impl CredentialManager for EncryptedCredentialManager {
    fn store(&self, account: &str, value: &str) -> Result<CredentialRef, CredentialError> {
        entry(SERVICE_NAME, account)?
            .set_password(value)
            .map_err(|e| {
                CredentialError::StorageError(format!("failed to store credential: {e}"))
            })?;

        Ok(CredentialRef::Keychain {
            service: SERVICE_NAME.to_owned(),
            account: account.to_owned(),
        })
    }

    fn retrieve(&self, cred_ref: &CredentialRef) -> Result<Option<String>, CredentialError> {
        match cred_ref {
            CredentialRef::None => Ok(None),
            CredentialRef::Plaintext(value) => Ok(Some(value.clone())),
            CredentialRef::Keychain { service, account } => {
                match entry(service, account)?.get_password() {
                    Ok(password) => Ok(Some(password)),
                    Err(keyring::Error::NoEntry) => Err(CredentialError::NotFound),
                    Err(e) => Err(CredentialError::StorageError(format!(
                        "failed to retrieve credential: {e}"
                    ))),
                }
            }
        }
    }

    fn delete(&self, cred_ref: &CredentialRef) -> Result<(), CredentialError> {
        match cred_ref {
            CredentialRef::None | CredentialRef::Plaintext(_) => Ok(()),
            CredentialRef::Keychain { service, account } => {
                match entry(service, account)?.delete_credential() {
                    Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                    Err(e) => Err(CredentialError::StorageError(format!(
                        "failed to delete credential: {e}"
                    ))),
                }
            }
        }
    }
}
