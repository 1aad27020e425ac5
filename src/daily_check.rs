//! One day's expiry sweep and reminder batch.
//!
//! The record lock is held only while sweeping and planning; sends happen
//! after it is released so admin operations are never blocked on the relay.
//! The delivery ledger is held for the whole send loop, so two checks in one
//! process never mail the same pass twice on a day.

use crate::error::Result;
use crate::notify::{DeliveryLedger, Mailer, OutgoingMail, render_reminder, select_due};
use crate::store::RecordStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Record store shared between front-ends and the scheduler.
pub type SharedStore = Arc<Mutex<RecordStore>>;

/// Mail capability that can be swapped while the scheduler runs.
pub type SharedMailer = Arc<RwLock<Arc<dyn Mailer>>>;

/// A reminder the relay did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedReminder {
    pub pass_id: String,
    pub employee_id: String,
    pub error: String,
}

/// A due pass for which no reminder was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedReminder {
    pub pass_id: String,
    pub reason: String,
}

/// Outcome of a daily check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCheckReport {
    pub day: NaiveDate,
    /// Pass ids flipped to `Expired` by the sweep.
    pub expired: Vec<String>,
    /// Pass ids whose reminder was accepted by the relay.
    pub sent: Vec<String>,
    pub failed: Vec<FailedReminder>,
    pub skipped: Vec<SkippedReminder>,
}

impl DailyCheckReport {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            expired: Vec::new(),
            sent: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Number of reminders that were selected for the day.
    pub fn due_count(&self) -> usize {
        self.sent.len() + self.failed.len() + self.skipped.len()
    }
}

#[derive(Debug)]
struct PlannedReminder {
    pass_id: String,
    employee_id: String,
    to: String,
    mail_subject: String,
    mail_body: String,
}

/// Everything a daily check needs, shared by the service and the scheduler.
pub struct DailyCheck {
    store: SharedStore,
    mailer: SharedMailer,
    ledger: Option<Mutex<DeliveryLedger>>,
    window_days: u32,
}

impl std::fmt::Debug for DailyCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyCheck")
            .field("window_days", &self.window_days)
            .field("ledger", &self.ledger.is_some())
            .finish_non_exhaustive()
    }
}

impl DailyCheck {
    pub fn new(
        store: SharedStore,
        mailer: SharedMailer,
        ledger: Option<DeliveryLedger>,
        window_days: u32,
    ) -> Self {
        Self {
            store,
            mailer,
            ledger: ledger.map(Mutex::new),
            window_days,
        }
    }

    /// Sweep, select, and send reminders for `day`.
    ///
    /// Individual send failures are collected in the report and never abort
    /// the batch.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Persistence` when the sweep cannot be saved; no
    /// reminders are sent in that case.
    pub async fn run_for(&self, day: NaiveDate) -> Result<DailyCheckReport> {
        let mut report = DailyCheckReport::new(day);
        let planned = {
            let mut store = self.store.lock().await;
            report.expired = store.sweep_and_persist(day)?.changed;
            self.plan(&store, day, &mut report)
        };

        let mailer = Arc::clone(&*self.mailer.read().await);
        let mut ledger = match &self.ledger {
            Some(ledger) => Some(ledger.lock().await),
            None => None,
        };
        if let Some(ledger) = ledger.as_mut()
            && let Err(e) = ledger.begin_day(day).await
        {
            warn!("delivery ledger unreadable, sending without dedupe: {e}");
        }

        for item in planned {
            if ledger
                .as_ref()
                .is_some_and(|ledger| ledger.is_delivered(&item.pass_id, day))
            {
                debug!(pass_id = %item.pass_id, "reminder already delivered today");
                report.skipped.push(SkippedReminder {
                    pass_id: item.pass_id,
                    reason: "already delivered today".to_owned(),
                });
                continue;
            }

            let mail = OutgoingMail {
                from: mailer.sender().to_owned(),
                to: item.to,
                subject: item.mail_subject,
                body: item.mail_body,
            };
            match mailer.send(&mail).await {
                Ok(()) => {
                    info!(pass_id = %item.pass_id, to = %mail.to, "reminder sent");
                    if let Some(ledger) = ledger.as_mut()
                        && let Err(e) = ledger.mark_delivered(&item.pass_id, day).await
                    {
                        warn!(pass_id = %item.pass_id, "cannot record delivery: {e}");
                    }
                    report.sent.push(item.pass_id);
                }
                Err(e) => {
                    warn!(pass_id = %item.pass_id, to = %mail.to, "reminder not sent: {e}");
                    report.failed.push(FailedReminder {
                        pass_id: item.pass_id,
                        employee_id: item.employee_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        drop(ledger);

        info!(
            %day,
            expired = report.expired.len(),
            sent = report.sent.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "daily check finished"
        );
        Ok(report)
    }

    fn plan(
        &self,
        store: &RecordStore,
        day: NaiveDate,
        report: &mut DailyCheckReport,
    ) -> Vec<PlannedReminder> {
        let mut planned = Vec::new();
        for due in select_due(store.passes(), day, self.window_days) {
            let pass = due.pass;
            let Some(employee) = store.employee(&pass.employee_id) else {
                warn!(
                    pass_id = %pass.pass_id,
                    employee_id = %pass.employee_id,
                    "reminder skipped: unknown employee"
                );
                report.skipped.push(SkippedReminder {
                    pass_id: pass.pass_id,
                    reason: format!("unknown employee '{}'", pass.employee_id),
                });
                continue;
            };
            let Some(pass_type) = store.pass_type(&pass.pass_type_id) else {
                warn!(
                    pass_id = %pass.pass_id,
                    pass_type_id = %pass.pass_type_id,
                    "reminder skipped: unknown pass type"
                );
                report.skipped.push(SkippedReminder {
                    pass_id: pass.pass_id,
                    reason: format!("unknown pass type '{}'", pass.pass_type_id),
                });
                continue;
            };

            let message = render_reminder(&employee.name, &pass_type.name, due.days_remaining);
            planned.push(PlannedReminder {
                employee_id: pass.employee_id,
                pass_id: pass.pass_id,
                to: employee.email.clone(),
                mail_subject: message.subject,
                mail_body: message.body,
            });
        }
        planned
    }
}
