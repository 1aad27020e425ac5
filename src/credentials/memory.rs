//! In-process credential store for tests.

use super::{CredentialError, CredentialManager, CredentialRef};
use std::collections::HashMap;
use std::sync::Mutex;

const SERVICE: &str = "safepass-test";

/// Keeps secrets in a map keyed by account.
#[derive(Debug, Default)]
pub(crate) struct MemoryCredentialManager {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialManager {
    pub(crate) fn contains(&self, account: &str) -> bool {
        self.secrets
            .lock()
            .map(|secrets| secrets.contains_key(account))
            .unwrap_or(false)
    }
}

fn poisoned<T>(_: T) -> CredentialError {
    CredentialError::StorageError("credential map poisoned".to_owned())
}

impl CredentialManager for MemoryCredentialManager {
    fn store(&self, account: &str, value: &str) -> Result<CredentialRef, CredentialError> {
        self.secrets
            .lock()
            .map_err(poisoned)?
            .insert(account.to_owned(), value.to_owned());
        Ok(CredentialRef::Keychain {
            service: SERVICE.to_owned(),
            account: account.to_owned(),
        })
    }

    fn retrieve(&self, cred_ref: &CredentialRef) -> Result<Option<String>, CredentialError> {
        match cred_ref {
            CredentialRef::None => Ok(None),
            CredentialRef::Plaintext(value) => Ok(Some(value.clone())),
            CredentialRef::Keychain { account, .. } => self
                .secrets
                .lock()
                .map_err(poisoned)?
                .get(account)
                .cloned()
                .map(Some)
                .ok_or(CredentialError::NotFound),
        }
    }

    fn delete(&self, cred_ref: &CredentialRef) -> Result<(), CredentialError> {
        if let CredentialRef::Keychain { account, .. } = cred_ref {
            self.secrets.lock().map_err(poisoned)?.remove(account);
        }
        Ok(())
    }
}
