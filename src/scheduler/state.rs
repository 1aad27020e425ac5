//! Scheduler lifecycle and persisted progress.

use crate::error::{PassError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted scheduler progress inside the data directory.
pub const STATE_FILE: &str = "scheduler.json";

/// Lifecycle of a scheduler. `Stopped` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Summary of one completed daily cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRunRecord {
    pub day: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub expired: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// What the scheduler remembers between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Most recent day whose cycle completed.
    pub last_processed_day: Option<NaiveDate>,
    /// Recent cycles, oldest first.
    #[serde(default)]
    pub history: Vec<DailyRunRecord>,
}

impl SchedulerSnapshot {
    /// Append a record, keeping at most `limit` entries.
    pub fn push_history(&mut self, record: DailyRunRecord, limit: usize) {
        self.history.push(record);
        let limit = limit.max(1);
        if self.history.len() > limit {
            let drop_count = self.history.len() - limit;
            self.history.drain(0..drop_count);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default = "default_state_version")]
    version: u8,
    #[serde(default)]
    last_processed_day: Option<NaiveDate>,
    #[serde(default)]
    history: Vec<DailyRunRecord>,
}

fn default_state_version() -> u8 {
    1
}

/// Default state path inside `data_dir`.
pub fn state_path_in(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE)
}

/// Load a snapshot; a missing file reads as the empty snapshot.
///
/// # Errors
///
/// Returns `PassError::Scheduler` if the file exists but cannot be read or parsed.
pub fn load_snapshot(path: &Path) -> Result<SchedulerSnapshot> {
    let bytes = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SchedulerSnapshot::default());
        }
        Err(e) => return Err(PassError::Scheduler(format!("cannot read state: {e}"))),
    };

    let state: PersistedState = serde_json::from_slice(&bytes)
        .map_err(|e| PassError::Scheduler(format!("cannot parse state: {e}")))?;

    Ok(SchedulerSnapshot {
        last_processed_day: state.last_processed_day,
        history: state.history,
    })
}

/// Persist a snapshot atomically.
///
/// # Errors
///
/// Returns `PassError::Scheduler` on serialization failure and
/// `PassError::Persistence` on I/O failure.
pub fn save_snapshot(path: &Path, snapshot: &SchedulerSnapshot) -> Result<()> {
    let state = PersistedState {
        version: default_state_version(),
        last_processed_day: snapshot.last_processed_day,
        history: snapshot.history.clone(),
    };
    let json = serde_json::to_vec_pretty(&state)
        .map_err(|e| PassError::Scheduler(format!("cannot serialize state: {e}")))?;
    crate::storage::write_atomic(path, &json)
}
