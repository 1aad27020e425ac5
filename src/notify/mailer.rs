//! Outbound mail capability and its SMTP implementation.

use crate::config::MailConfig;
use crate::credentials::CredentialManager;
use crate::error::{PassError, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

/// One plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Something that can deliver a message, once, best-effort.
///
/// Every transport, address or authentication fault is reported as
/// `PassError::Delivery`.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Address used as the sender of reminders.
    fn sender(&self) -> &str;

    /// Deliver `mail`.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Delivery` if the message was not accepted.
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// STARTTLS relay client built from a [`MailConfig`].
///
/// Reconfiguring means building a new instance; an existing one never
/// changes its relay or credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay: String,
    sender: String,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("relay", &self.relay)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    /// Build a relay client. The secret is resolved once, here.
    ///
    /// # Errors
    ///
    /// `Validation` for incomplete settings, `Credential` when the secret
    /// cannot be resolved, `Config` when the relay host is rejected.
    pub fn from_config(config: &MailConfig, credentials: &dyn CredentialManager) -> Result<Self> {
        config.validate()?;
        let port = config.port()?;
        let secret = if config.password.is_set() {
            Some(config.password.resolve(credentials)?)
        } else {
            None
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| {
                PassError::Config(format!("invalid relay host '{}': {e}", config.smtp_server))
            })?
            .port(port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let Some(secret) = secret {
            builder = builder.credentials(Credentials::new(config.username.clone(), secret));
        }

        Ok(Self {
            transport: builder.build(),
            relay: format!("{}:{port}", config.smtp_server),
            sender: config.sender().to_owned(),
        })
    }
}

fn mailbox(raw: &str) -> Result<Mailbox> {
    raw.parse::<Mailbox>()
        .map_err(|e| PassError::Delivery(format!("invalid address '{raw}': {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn sender(&self) -> &str {
        &self.sender
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = Message::builder()
            .from(mailbox(&mail.from)?)
            .to(mailbox(&mail.to)?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| PassError::Delivery(format!("cannot build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| {
                PassError::Delivery(format!("relay {} rejected message: {e}", self.relay))
            })?;

        debug!(to = %mail.to, relay = %self.relay, "message accepted by relay");
        Ok(())
    }
}

/// Stand-in used when no relay is configured; every send fails.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    fn sender(&self) -> &str {
        ""
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        Err(PassError::Delivery(format!(
            "mail relay is not configured; message to {} not sent",
            mail.to
        )))
    }
}
