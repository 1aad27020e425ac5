//! Configuration types for pass tracking and reminder delivery.

use crate::credentials::{CredentialManager, CredentialRef};
use crate::error::{PassError, Result};
use crate::notify::DEFAULT_WINDOW_DAYS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafePassConfig {
    /// Where record files live.
    pub storage: StorageConfig,
    /// Outbound mail relay.
    pub mail: MailConfig,
    /// Reminder policy.
    pub notifications: NotificationConfig,
    /// Daily check loop.
    pub scheduler: SchedulerConfig,
}

/// Record storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the CSV files, scheduler state and delivery ledger.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Credential store account holding the relay secret.
pub const MAIL_PASSWORD_ACCOUNT: &str = "mail.password";

/// SMTP relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Relay host name.
    pub smtp_server: String,
    /// Relay port (STARTTLS). Kept wider than `u16` so out-of-range values
    /// surface as validation errors instead of parse errors.
    pub smtp_port: u32,
    /// Account used to authenticate against the relay.
    pub username: String,
    /// Sender address; defaults to `username` when unset.
    pub from_address: Option<String>,
    /// Relay secret.
    pub password: CredentialRef,
    /// Per-message transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_owned(),
            smtp_port: 587,
            username: String::new(),
            from_address: None,
            password: CredentialRef::None,
            timeout_secs: 30,
        }
    }
}

impl MailConfig {
    /// Address reminders are sent from.
    pub fn sender(&self) -> &str {
        self.from_address.as_deref().unwrap_or(&self.username)
    }

    /// Relay port as `u16`.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Validation` outside `1..=65535`.
    pub fn port(&self) -> Result<u16> {
        u16::try_from(self.smtp_port)
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| {
                PassError::Validation(format!(
                    "smtp_port {} is out of range (1-65535)",
                    self.smtp_port
                ))
            })
    }

    /// Keep `secret` in `manager` and point `password` at it.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty secret, `Credential` if the store fails.
    pub fn store_password(&mut self, manager: &dyn CredentialManager, secret: &str) -> Result<()> {
        if secret.is_empty() {
            return Err(PassError::Validation("password must not be empty".to_owned()));
        }
        self.password = manager.store(MAIL_PASSWORD_ACCOUNT, secret)?;
        Ok(())
    }

    /// Delete a stored relay secret and clear the reference.
    ///
    /// # Errors
    ///
    /// `Credential` if the store refuses the delete; `password` is kept then.
    pub fn clear_password(&mut self, manager: &dyn CredentialManager) -> Result<()> {
        manager.delete(&self.password)?;
        self.password = CredentialRef::None;
        Ok(())
    }

    /// Check that the relay settings are complete enough to send mail.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Validation` for an empty host or username, an
    /// out-of-range port, or a malformed sender address.
    pub fn validate(&self) -> Result<()> {
        crate::records::require_non_empty("smtp_server", &self.smtp_server)?;
        crate::records::require_non_empty("username", &self.username)?;
        self.port()?;
        crate::records::validate_email(self.sender())
    }
}

/// Reminder policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Look-ahead window in days.
    pub window_days: u32,
    /// Skip reminders already delivered for the same pass on the same day.
    pub delivery_ledger: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            delivery_ledger: true,
        }
    }
}

/// Daily check loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between polls of the calendar day.
    pub poll_interval_secs: u64,
    /// Daily run records kept in the persisted scheduler state.
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3600,
            history_limit: 90,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("safepass"))
        .unwrap_or_else(|| PathBuf::from("safety_pass_data"))
}

impl SafePassConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PassError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| PassError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/safepass/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("safepass").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("safepass-config.toml"))
    }

    /// Validate everything that does not depend on the mail relay being used.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Validation` for a zero window or poll interval, a
    /// zero history limit, or an out-of-range relay port.
    pub fn validate(&self) -> Result<()> {
        if self.notifications.window_days == 0 {
            return Err(PassError::Validation(
                "notifications.window_days must be at least 1".to_owned(),
            ));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(PassError::Validation(
                "scheduler.poll_interval_secs must be at least 1".to_owned(),
            ));
        }
        if self.scheduler.history_limit == 0 {
            return Err(PassError::Validation(
                "scheduler.history_limit must be at least 1".to_owned(),
            ));
        }
        self.mail.port().map(|_| ())
    }
}
