//! SafePass: safety pass tracking with expiry reminders.
//!
//! Employees hold safety passes of configurable types. Each pass has a fixed
//! validity window; a daily check flips passes past their expiry date to
//! `Expired` and emails holders whose passes expire soon.
//!
//! # Architecture
//!
//! - **Records**: employees, pass types and issued passes, persisted as CSV
//! - **Expiry**: pure date arithmetic over a reference day
//! - **Notify**: reminder selection, message templates, SMTP delivery and a
//!   same-day delivery ledger
//! - **Scheduler**: a tokio task that runs the daily check once per day
//! - **Service**: the administrative surface used by the CLI

pub mod config;
pub mod credentials;
pub mod daily_check;
pub mod error;
pub mod expiry;
pub mod notify;
pub mod records;
pub mod reports;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod store;

pub use config::SafePassConfig;
pub use daily_check::DailyCheckReport;
pub use error::{PassError, RecordKind, Result};
pub use expiry::PassView;
pub use records::{Employee, EmployeeUpdate, IssuedPass, PassStatus, PassType};
pub use reports::{Report, ReportKind};
pub use scheduler::SchedulerState;
pub use service::PassService;
pub use store::RecordStore;
