//! Core types for credential management.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Reference to a stored credential.
///
/// - `Keychain`: stored in the platform credential store
/// - `Plaintext`: written directly in the config file
/// - `None`: no credential configured
///
/// # Serialization
///
/// - `Plaintext("value")` serializes as `"value"` (bare string)
/// - `None` serializes as `""` (empty string, TOML-safe)
/// - `Keychain { service, account }` serializes as `{ service = "...", account = "..." }`
#[derive(Clone, PartialEq, Eq, Default)]
pub enum CredentialRef {
    /// Credential stored in the platform credential store.
    Keychain {
        /// Service name (e.g., "safepass-credentials")
        service: String,
        /// Account identifier (e.g., "mail.password")
        account: String,
    },
    /// Plaintext credential value.
    Plaintext(String),
    /// No credential configured.
    #[default]
    None,
}

impl std::fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keychain { service, account } => f
                .debug_struct("Keychain")
                .field("service", service)
                .field("account", account)
                .finish(),
            Self::Plaintext(_) => f.write_str("Plaintext([REDACTED])"),
            Self::None => f.write_str("None"),
        }
    }
}

impl Serialize for CredentialRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CredentialRef::Plaintext(value) => serializer.serialize_str(value),
            CredentialRef::None => serializer.serialize_str(""),
            CredentialRef::Keychain { service, account } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("service", service)?;
                map.serialize_entry("account", account)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CredentialRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CredentialRefVisitor;

        impl<'de> Visitor<'de> for CredentialRefVisitor {
            type Value = CredentialRef;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a string or a map with 'service' and 'account' keys")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<CredentialRef, E> {
                if value.is_empty() {
                    Ok(CredentialRef::None)
                } else {
                    Ok(CredentialRef::Plaintext(value.to_owned()))
                }
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<CredentialRef, M::Error> {
                let mut service: Option<String> = Option::None;
                let mut account: Option<String> = Option::None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "service" => service = Some(map.next_value()?),
                        "account" => account = Some(map.next_value()?),
                        _ => {
                            let _ignored: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }

                let service = service.ok_or_else(|| de::Error::missing_field("service"))?;
                let account = account.ok_or_else(|| de::Error::missing_field("account"))?;
                Ok(CredentialRef::Keychain { service, account })
            }
        }

        deserializer.deserialize_any(CredentialRefVisitor)
    }
}

impl CredentialRef {
    /// Check if this reference points to an actual credential.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, CredentialRef::None)
    }

    /// Resolve the credential to its secret value.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::NotFound` if the credential is `None` or missing
    /// from the store, and `CredentialError::StorageError` if the store fails.
    pub fn resolve(
        &self,
        manager: &dyn super::CredentialManager,
    ) -> Result<String, CredentialError> {
        match self {
            CredentialRef::Plaintext(value) => Ok(value.clone()),
            CredentialRef::Keychain { .. } => {
                manager.retrieve(self)?.ok_or(CredentialError::NotFound)
            }
            CredentialRef::None => Err(CredentialError::NotFound),
        }
    }
}

/// Errors that can occur during credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Credential not found in storage.
    #[error("credential not found")]
    NotFound,

    /// Generic storage error.
    #[error("storage error: {0}")]
    StorageError(String),
}
