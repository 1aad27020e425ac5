//! Renewal reminders: who is due, what to say, how it is delivered.

pub mod ledger;
pub mod mailer;
pub mod message;
pub mod selector;

pub use ledger::{DeliveryLedger, LEDGER_FILE};
pub use mailer::{Mailer, OutgoingMail, SmtpMailer, UnconfiguredMailer};
pub use message::{ReminderMessage, render_reminder};
pub use selector::{DEFAULT_WINDOW_DAYS, DueReminder, select_due};
