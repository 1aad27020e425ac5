//! Daily check scheduling.

pub mod runner;
pub mod state;

pub use runner::{DailyJob, Scheduler, Today, system_today};
pub use state::{DailyRunRecord, STATE_FILE, SchedulerSnapshot, SchedulerState, state_path_in};
