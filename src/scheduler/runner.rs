//! Scheduler background loop.
//!
//! Spawns a tokio task that polls the calendar day and runs the daily check
//! at most once per day. Progress and run history are persisted to
//! `<data dir>/scheduler.json`.

use crate::config::SchedulerConfig;
use crate::daily_check::{DailyCheck, DailyCheckReport};
use crate::error::{PassError, Result};
use crate::scheduler::state::{
    DailyRunRecord, SchedulerSnapshot, SchedulerState, load_snapshot, save_snapshot,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Source of the current calendar day.
pub type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Local calendar day from the system clock.
pub fn system_today() -> Today {
    Arc::new(|| chrono::Local::now().date_naive())
}

/// Work performed once per calendar day.
#[async_trait]
pub trait DailyJob: Send + Sync {
    /// Run the cycle for `day`.
    ///
    /// # Errors
    ///
    /// An error means the day must not be marked processed.
    async fn run_for(&self, day: NaiveDate) -> Result<DailyCheckReport>;
}

#[async_trait]
impl DailyJob for DailyCheck {
    async fn run_for(&self, day: NaiveDate) -> Result<DailyCheckReport> {
        DailyCheck::run_for(self, day).await
    }
}

#[derive(Clone)]
struct Runner {
    job: Arc<dyn DailyJob>,
    progress: Arc<Mutex<SchedulerSnapshot>>,
    state_path: Option<PathBuf>,
    history_limit: usize,
}

impl Runner {
    async fn poll_once(&self, today: NaiveDate) -> Result<Option<DailyRunRecord>> {
        // Held for the whole cycle: concurrent polls serialize and see the
        // updated day.
        let mut progress = self.progress.lock().await;

        if let Some(last) = progress.last_processed_day {
            if last >= today {
                if last > today {
                    warn!(%last, %today, "calendar day moved backwards; waiting");
                }
                return Ok(None);
            }
            let gap = today.signed_duration_since(last).num_days();
            if gap > 1 {
                warn!(
                    %last,
                    %today,
                    missed = gap - 1,
                    "catching up after a gap; missed days are not replayed"
                );
            }
        }

        debug!(%today, "running daily cycle");
        let started_at = Utc::now();
        let report = self.job.run_for(today).await?;
        let record = DailyRunRecord {
            day: today,
            started_at,
            finished_at: Utc::now(),
            expired: report.expired.len(),
            sent: report.sent.len(),
            failed: report.failed.len(),
            skipped: report.skipped.len(),
        };

        progress.last_processed_day = Some(today);
        progress.push_history(record.clone(), self.history_limit);
        if let Some(path) = &self.state_path
            && let Err(e) = save_snapshot(path, &progress)
        {
            error!("cannot persist scheduler state: {e}");
        }

        Ok(Some(record))
    }
}

struct Lifecycle {
    state: SchedulerState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Daily check loop with an explicit lifecycle: `Idle` → `Running` → `Stopped`.
pub struct Scheduler {
    runner: Runner,
    today: Today,
    poll_interval: Duration,
    lifecycle: std::sync::Mutex<Lifecycle>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("poll_interval", &self.poll_interval)
            .field("state_path", &self.runner.state_path)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create an idle scheduler.
    ///
    /// When `state_path` is set, earlier progress is loaded from it; an
    /// unreadable file is logged and ignored.
    pub fn new(
        job: Arc<dyn DailyJob>,
        today: Today,
        config: &SchedulerConfig,
        state_path: Option<PathBuf>,
    ) -> Self {
        let snapshot = match state_path.as_deref().map(load_snapshot) {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(e)) => {
                warn!("cannot load scheduler state, starting fresh: {e}");
                SchedulerSnapshot::default()
            }
            None => SchedulerSnapshot::default(),
        };
        if let Some(day) = snapshot.last_processed_day {
            debug!(%day, "resuming scheduler after last processed day");
        }

        Self {
            runner: Runner {
                job,
                progress: Arc::new(Mutex::new(snapshot)),
                state_path,
                history_limit: config.history_limit.max(1),
            },
            today,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            lifecycle: std::sync::Mutex::new(Lifecycle {
                state: SchedulerState::Idle,
                cancel: CancellationToken::new(),
                handle: None,
            }),
        }
    }

    fn lock_lifecycle(&self) -> Result<std::sync::MutexGuard<'_, Lifecycle>> {
        self.lifecycle
            .lock()
            .map_err(|_| PassError::Scheduler("scheduler lifecycle lock poisoned".to_owned()))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.lock_lifecycle()
            .map(|lifecycle| lifecycle.state)
            .unwrap_or(SchedulerState::Stopped)
    }

    /// Copy of the persisted progress.
    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.runner.progress.lock().await.clone()
    }

    /// Run the daily cycle for `today` unless that day was already processed.
    ///
    /// Returns the run record when a cycle ran.
    ///
    /// # Errors
    ///
    /// Propagates the cycle's error; the day stays unprocessed and the next
    /// poll retries it.
    pub async fn poll_once(&self, today: NaiveDate) -> Result<Option<DailyRunRecord>> {
        self.runner.poll_once(today).await
    }

    /// Spawn the polling loop. The first poll happens immediately.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Scheduler` if the scheduler is already running or
    /// has been stopped.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle()?;
        match lifecycle.state {
            SchedulerState::Running => {
                return Err(PassError::Scheduler(
                    "scheduler is already running".to_owned(),
                ));
            }
            SchedulerState::Stopped => {
                return Err(PassError::Scheduler(
                    "a stopped scheduler cannot be restarted".to_owned(),
                ));
            }
            SchedulerState::Idle => {}
        }

        let runner = self.runner.clone();
        let today = Arc::clone(&self.today);
        let cancel = lifecycle.cancel.clone();
        let poll_interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            info!(
                "scheduler started, polling every {}s",
                poll_interval.as_secs()
            );
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let day = today();
                        if let Err(e) = runner.poll_once(day).await {
                            error!(%day, "daily cycle failed, will retry on next poll: {e}");
                        }
                    }
                }
            }
            debug!("scheduler loop exited");
        });

        lifecycle.handle = Some(handle);
        lifecycle.state = SchedulerState::Running;
        Ok(())
    }

    /// Stop the loop and wait for an in-flight cycle to finish.
    ///
    /// Stopping twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Scheduler` if the loop task panicked.
    pub async fn stop(&self) -> Result<()> {
        let handle = {
            let mut lifecycle = self.lock_lifecycle()?;
            if lifecycle.state == SchedulerState::Stopped {
                return Ok(());
            }
            lifecycle.state = SchedulerState::Stopped;
            lifecycle.cancel.cancel();
            lifecycle.handle.take()
        };

        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| PassError::Scheduler(format!("scheduler task failed: {e}")))?;
        }
        info!("scheduler stopped");
        Ok(())
    }
}
