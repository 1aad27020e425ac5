//! Delivery ledger: which reminders already went out today.
//!
//! One JSON line per accepted reminder, `{pass_id, day, sent_at}`. Only the
//! current day matters for dedupe, so [`DeliveryLedger::begin_day`] drops
//! older lines and loads the rest once per cycle; lookups after that are
//! in memory. Writers take a lock file shared by every process on the path.

use crate::error::{PassError, Result};
use crate::storage::write_atomic;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// File name of the ledger inside the data directory.
pub const LEDGER_FILE: &str = "delivery_ledger.jsonl";

const LOCK_TIMEOUT: Duration = Duration::from_millis(1500);
const LOCK_RETRY: Duration = Duration::from_millis(10);
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Delivery {
    pass_id: String,
    day: NaiveDate,
    sent_at: DateTime<Utc>,
}

/// Reminders delivered on the current day, backed by a JSONL file.
#[derive(Debug)]
pub struct DeliveryLedger {
    path: PathBuf,
    day: Option<NaiveDate>,
    delivered: HashSet<String>,
}

impl DeliveryLedger {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            day: None,
            delivered: HashSet::new(),
        }
    }

    /// Ledger at the default location inside `data_dir`.
    #[must_use]
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(LEDGER_FILE))
    }

    /// Load the deliveries recorded for `day` and compact the file down to
    /// lines for `day` or later. Returns how many lines were dropped.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` if the file cannot be read or
    /// rewritten, or the lock is not obtained in time. The in-memory set is
    /// unchanged in that case.
    pub async fn begin_day(&mut self, day: NaiveDate) -> Result<usize> {
        let _guard = self.lock().await?;
        let (kept, dropped) = self.read_from(day)?;

        if dropped > 0 {
            let mut bytes = Vec::new();
            for delivery in &kept {
                let line = encode(delivery)?;
                bytes.extend_from_slice(line.as_bytes());
                bytes.push(b'\n');
            }
            write_atomic(&self.path, &bytes)?;
            info!(%day, dropped, "delivery ledger compacted");
        }

        self.delivered = kept
            .into_iter()
            .filter(|delivery| delivery.day == day)
            .map(|delivery| delivery.pass_id)
            .collect();
        self.day = Some(day);
        debug!(%day, delivered = self.delivered.len(), "delivery ledger loaded");
        Ok(dropped)
    }

    /// Whether a reminder for `pass_id` was recorded on `day`.
    ///
    /// Answers from the set loaded by the last [`begin_day`](Self::begin_day);
    /// any other day reads as not delivered.
    pub fn is_delivered(&self, pass_id: &str, day: NaiveDate) -> bool {
        self.day == Some(day) && self.delivered.contains(pass_id)
    }

    /// Record that the reminder for `pass_id` went out on `day`. Returns
    /// `false` when it was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` for an empty pass id, a lock timeout,
    /// or an I/O failure.
    pub async fn mark_delivered(&mut self, pass_id: &str, day: NaiveDate) -> Result<bool> {
        let pass_id = pass_id.trim();
        if pass_id.is_empty() {
            return Err(PassError::Persistence(
                "delivered pass id must not be empty".to_owned(),
            ));
        }
        if self.is_delivered(pass_id, day) {
            return Ok(false);
        }

        let _guard = self.lock().await?;
        let line = encode(&Delivery {
            pass_id: pass_id.to_owned(),
            day,
            sent_at: Utc::now(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PassError::Persistence(format!("cannot open '{}': {e}", self.path.display()))
            })?;
        writeln!(file, "{line}").map_err(|e| {
            PassError::Persistence(format!("cannot append to '{}': {e}", self.path.display()))
        })?;

        if self.day != Some(day) {
            self.day = Some(day);
            self.delivered.clear();
        }
        self.delivered.insert(pass_id.to_owned());
        Ok(true)
    }

    /// Lines for `day` or later, plus the count of everything else.
    fn read_from(&self, day: NaiveDate) -> Result<(Vec<Delivery>, usize)> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => {
                return Err(PassError::Persistence(format!(
                    "cannot read '{}': {e}",
                    self.path.display()
                )));
            }
        };

        let mut kept = Vec::new();
        let mut dropped = 0;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<Delivery>(line) {
                Ok(delivery) if delivery.day >= day => kept.push(delivery),
                Ok(_) => dropped += 1,
                Err(e) => {
                    warn!("dropping malformed line in {}: {e}", self.path.display());
                    dropped += 1;
                }
            }
        }
        Ok((kept, dropped))
    }

    async fn lock(&self) -> Result<LockFile> {
        let lock_path = self.path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PassError::Persistence(format!("cannot create '{}': {e}", parent.display()))
            })?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(LockFile { path: lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&lock_path) {
                        warn!("removing stale ledger lock {}", lock_path.display());
                        let _ = std::fs::remove_file(&lock_path);
                        continue;
                    }
                    if started.elapsed() > LOCK_TIMEOUT {
                        return Err(PassError::Persistence(format!(
                            "ledger lock {} held by another process",
                            lock_path.display()
                        )));
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => {
                    return Err(PassError::Persistence(format!(
                        "cannot create ledger lock {}: {e}",
                        lock_path.display()
                    )));
                }
            }
        }
    }
}

fn encode(delivery: &Delivery) -> Result<String> {
    serde_json::to_string(delivery)
        .map_err(|e| PassError::Persistence(format!("cannot encode ledger line: {e}")))
}

fn lock_is_stale(lock_path: &Path) -> bool {
    std::fs::metadata(lock_path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Removes the lock file when dropped.
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn day(raw: &str) -> NaiveDate {
        crate::records::parse_date(raw).unwrap()
    }

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path).unwrap().lines().count()
    }

    #[tokio::test]
    async fn marks_once_per_pass_and_day() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut ledger = DeliveryLedger::in_data_dir(temp.path());
        let today = day("2025-03-20");
        ledger.begin_day(today).await.unwrap();

        assert!(!ledger.is_delivered("PASS001", today));
        assert!(ledger.mark_delivered("PASS001", today).await.unwrap());
        assert!(!ledger.mark_delivered("PASS001", today).await.unwrap());
        assert!(ledger.is_delivered("PASS001", today));
        assert!(!ledger.is_delivered("PASS001", day("2025-03-21")));
        assert_eq!(line_count(&temp.path().join(LEDGER_FILE)), 1);
        assert!(!temp.path().join("delivery_ledger.lock").exists());
    }

    #[tokio::test]
    async fn a_new_handle_sees_todays_deliveries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let today = day("2025-03-20");
        let mut first = DeliveryLedger::in_data_dir(temp.path());
        first.mark_delivered("PASS001", today).await.unwrap();

        let mut second = DeliveryLedger::in_data_dir(temp.path());
        assert_eq!(second.begin_day(today).await.unwrap(), 0);
        assert!(second.is_delivered("PASS001", today));
    }

    #[tokio::test]
    async fn begin_day_drops_earlier_days() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(LEDGER_FILE);
        let mut ledger = DeliveryLedger::new(path.clone());
        ledger.mark_delivered("PASS001", day("2025-03-18")).await.unwrap();
        ledger.mark_delivered("PASS001", day("2025-03-19")).await.unwrap();
        ledger.mark_delivered("PASS002", day("2025-03-19")).await.unwrap();
        assert_eq!(line_count(&path), 3);

        let dropped = ledger.begin_day(day("2025-03-19")).await.unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(line_count(&path), 2);

        let dropped = ledger.begin_day(day("2025-03-20")).await.unwrap();
        assert_eq!(dropped, 2);
        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
        assert!(!ledger.is_delivered("PASS001", day("2025-03-19")));
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_on_compaction() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(LEDGER_FILE);
        std::fs::write(&path, "not json\n").unwrap();
        let mut ledger = DeliveryLedger::new(path.clone());

        assert_eq!(ledger.begin_day(day("2025-03-20")).await.unwrap(), 1);
        assert!(ledger.mark_delivered("PASS002", day("2025-03-20")).await.unwrap());
        assert_eq!(line_count(&path), 1);
    }

    #[tokio::test]
    async fn stale_lock_is_evicted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = temp.path().join("delivery_ledger.lock");
        let file = std::fs::File::create(&lock).unwrap();
        let old = SystemTime::now() - Duration::from_secs(120);
        file.set_modified(old).unwrap();
        drop(file);

        let mut ledger = DeliveryLedger::in_data_dir(temp.path());
        assert!(ledger.mark_delivered("PASS001", day("2025-03-20")).await.unwrap());
        assert!(!lock.exists());
    }

    #[tokio::test]
    async fn empty_pass_id_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut ledger = DeliveryLedger::in_data_dir(temp.path());
        assert!(ledger.mark_delivered("   ", day("2025-03-20")).await.is_err());
    }
}
