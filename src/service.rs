//! `PassService`: the administrative surface shared by every front-end.
//!
//! Cheap to clone; all clones share one record store, one mailer slot and
//! one scheduler.

use crate::config::{MailConfig, SafePassConfig};
use crate::credentials::{self, CredentialManager};
use crate::daily_check::{DailyCheck, DailyCheckReport, SharedMailer, SharedStore};
use crate::error::{PassError, RecordKind, Result};
use crate::expiry::PassView;
use crate::notify::{
    DEFAULT_WINDOW_DAYS, DeliveryLedger, Mailer, OutgoingMail, SmtpMailer, UnconfiguredMailer,
    render_reminder, select_due,
};
use crate::records::{Employee, EmployeeUpdate, IssuedPass, PassStatus, PassType, validate_email};
use crate::reports::{Report, ReportKind};
use crate::scheduler::{Scheduler, SchedulerState, Today, state_path_in, system_today};
use crate::storage::CsvStorage;
use crate::store::RecordStore;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

const TEST_RECIPIENT_NAME: &str = "Test User";
const TEST_PASS_NAME: &str = "Test Safety Pass";
const TEST_DAYS_REMAINING: i64 = 5;

struct Inner {
    store: SharedStore,
    mailer: SharedMailer,
    credentials: Arc<dyn CredentialManager>,
    daily: Arc<DailyCheck>,
    scheduler: Scheduler,
    today: Today,
    window_days: u32,
}

/// Administrative operations, the daily check and the scheduler.
#[derive(Clone)]
pub struct PassService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PassService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassService")
            .field("window_days", &self.inner.window_days)
            .field("scheduler", &self.inner.scheduler)
            .finish_non_exhaustive()
    }
}

/// Wiring for a [`PassService`].
pub struct PassServiceBuilder {
    store: RecordStore,
    mailer: Arc<dyn Mailer>,
    credentials: Option<Arc<dyn CredentialManager>>,
    ledger: Option<DeliveryLedger>,
    scheduler: crate::config::SchedulerConfig,
    state_path: Option<PathBuf>,
    today: Option<Today>,
    window_days: u32,
}

impl PassServiceBuilder {
    /// Reminder look-ahead window in days.
    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    /// Enable same-day reminder dedupe.
    pub fn with_delivery_ledger(mut self, ledger: DeliveryLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Scheduler polling and history settings.
    pub fn with_scheduler_config(mut self, config: crate::config::SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Persist scheduler progress at `path`.
    pub fn with_state_path(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    /// Override the calendar. Defaults to the local system day.
    pub fn with_today(mut self, today: Today) -> Self {
        self.today = Some(today);
        self
    }

    /// Credential manager used when reconfiguring the mailer.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> PassService {
        let store: SharedStore = Arc::new(Mutex::new(self.store));
        let mailer: SharedMailer = Arc::new(RwLock::new(self.mailer));
        let today = self.today.unwrap_or_else(system_today);
        let daily = Arc::new(DailyCheck::new(
            Arc::clone(&store),
            Arc::clone(&mailer),
            self.ledger,
            self.window_days,
        ));
        let scheduler = Scheduler::new(
            Arc::clone(&daily) as Arc<dyn crate::scheduler::DailyJob>,
            Arc::clone(&today),
            &self.scheduler,
            self.state_path,
        );

        PassService {
            inner: Arc::new(Inner {
                store,
                mailer,
                credentials: self
                    .credentials
                    .unwrap_or_else(|| Arc::from(credentials::create_manager())),
                daily,
                scheduler,
                today,
                window_days: self.window_days,
            }),
        }
    }
}

impl PassService {
    pub fn builder(store: RecordStore, mailer: Arc<dyn Mailer>) -> PassServiceBuilder {
        PassServiceBuilder {
            store,
            mailer,
            credentials: None,
            ledger: None,
            scheduler: crate::config::SchedulerConfig::default(),
            state_path: None,
            today: None,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    /// Wire a service from configuration: CSV files in the data directory,
    /// the SMTP relay when mail settings are complete, the delivery ledger
    /// when enabled, and persisted scheduler state.
    ///
    /// # Errors
    ///
    /// `Validation` for an invalid config, `Persistence` if the data
    /// directory cannot be prepared or read, `Config` for a relay host the
    /// transport rejects.
    pub fn from_config(config: &SafePassConfig) -> Result<Self> {
        Self::from_config_with_credentials(config, Arc::from(credentials::create_manager()))
    }

    /// [`from_config`](Self::from_config) with an explicit credential store.
    ///
    /// Incomplete mail settings and an unresolvable relay secret both leave
    /// the service usable with an [`UnconfiguredMailer`]; only sending fails.
    ///
    /// # Errors
    ///
    /// As [`from_config`](Self::from_config).
    pub fn from_config_with_credentials(
        config: &SafePassConfig,
        credentials: Arc<dyn CredentialManager>,
    ) -> Result<Self> {
        config.validate()?;
        let data_dir = &config.storage.data_dir;
        let storage = CsvStorage::new(data_dir.clone());
        storage.ensure_layout()?;
        let store = RecordStore::open(Box::new(storage))?;

        let mailer: Arc<dyn Mailer> = if let Err(e) = config.mail.validate() {
            warn!("mail relay not configured, reminders will fail: {e}");
            Arc::new(UnconfiguredMailer)
        } else {
            match SmtpMailer::from_config(&config.mail, credentials.as_ref()) {
                Ok(mailer) => Arc::new(mailer),
                Err(PassError::Credential(e)) => {
                    warn!("relay password unavailable, reminders will fail: {e}");
                    Arc::new(UnconfiguredMailer)
                }
                Err(e) => return Err(e),
            }
        };

        let mut builder = Self::builder(store, mailer)
            .with_window_days(config.notifications.window_days)
            .with_scheduler_config(config.scheduler.clone())
            .with_state_path(state_path_in(data_dir))
            .with_credentials(credentials);
        if config.notifications.delivery_ledger {
            builder = builder.with_delivery_ledger(DeliveryLedger::in_data_dir(data_dir));
        }
        info!(data_dir = %data_dir.display(), "pass service ready");
        Ok(builder.build())
    }

    /// Lock the store and pick up records written by other processes.
    async fn fresh_store(&self) -> MutexGuard<'_, RecordStore> {
        let mut store = self.inner.store.lock().await;
        if let Err(e) = store.reload() {
            warn!("serving cached records, reload failed: {e}");
        }
        store
    }

    /// Today according to the service calendar.
    pub fn today(&self) -> NaiveDate {
        (self.inner.today)()
    }

    // ── Employees ────────────────────────────────────────────────────────────

    pub async fn add_employee(&self, employee: Employee) -> Result<()> {
        self.inner.store.lock().await.add_employee(employee)
    }

    pub async fn remove_employee(&self, employee_id: &str) -> Result<Employee> {
        self.inner.store.lock().await.remove_employee(employee_id)
    }

    pub async fn update_employee(
        &self,
        employee_id: &str,
        update: &EmployeeUpdate,
    ) -> Result<Employee> {
        self.inner
            .store
            .lock()
            .await
            .update_employee(employee_id, update)
    }

    pub async fn list_employees(&self) -> Vec<Employee> {
        self.fresh_store().await.employees().cloned().collect()
    }

    // ── Pass types ───────────────────────────────────────────────────────────

    pub async fn add_pass_type(&self, pass_type: PassType) -> Result<()> {
        self.inner.store.lock().await.add_pass_type(pass_type)
    }

    pub async fn remove_pass_type(&self, pass_type_id: &str) -> Result<PassType> {
        self.inner.store.lock().await.remove_pass_type(pass_type_id)
    }

    pub async fn list_pass_types(&self) -> Vec<PassType> {
        self.fresh_store().await.pass_types().cloned().collect()
    }

    // ── Passes ───────────────────────────────────────────────────────────────

    /// Issue a pass. `issue_date` defaults to today.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown employee or pass type, `Validation` for a
    /// duplicate pass id, `Persistence` on save failure.
    pub async fn issue_pass(
        &self,
        pass_id: &str,
        employee_id: &str,
        pass_type_id: &str,
        issue_date: Option<NaiveDate>,
    ) -> Result<IssuedPass> {
        let issue_date = issue_date.unwrap_or_else(|| self.today());
        self.inner
            .store
            .lock()
            .await
            .issue_pass(pass_id, employee_id, pass_type_id, issue_date)
    }

    pub async fn revoke_pass(&self, pass_id: &str) -> Result<IssuedPass> {
        self.inner.store.lock().await.revoke_pass(pass_id)
    }

    /// Every pass with its status as of today, in pass id order.
    pub async fn list_passes(&self) -> Vec<PassView> {
        let today = self.today();
        self.fresh_store()
            .await
            .passes()
            .map(|pass| PassView::new(pass, today))
            .collect()
    }

    /// All passes held by `employee_id`: active ones first by days
    /// remaining, then the rest by pass id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the employee does not exist.
    pub async fn get_passes_for_employee(&self, employee_id: &str) -> Result<Vec<PassView>> {
        let today = self.today();
        let store = self.fresh_store().await;
        if store.employee(employee_id).is_none() {
            return Err(PassError::not_found(RecordKind::Employee, employee_id));
        }

        let mut views: Vec<PassView> = store
            .passes()
            .filter(|pass| pass.employee_id == employee_id)
            .map(|pass| PassView::new(pass, today))
            .collect();
        views.sort_by(|a, b| {
            let a_inactive = a.status != PassStatus::Active;
            let b_inactive = b.status != PassStatus::Active;
            a_inactive
                .cmp(&b_inactive)
                .then_with(|| {
                    if a_inactive {
                        std::cmp::Ordering::Equal
                    } else {
                        a.days_remaining.cmp(&b.days_remaining)
                    }
                })
                .then_with(|| a.pass.pass_id.cmp(&b.pass.pass_id))
        });
        Ok(views)
    }

    /// Active passes expiring in `1..=window_days` days, soonest first.
    ///
    /// Read-only: no sweep is persisted here. A pass whose stored status is
    /// still `Active` after its expiry date is excluded anyway, because
    /// selection goes through the computed status for today.
    pub async fn get_expiring_passes(&self, window_days: u32) -> Vec<PassView> {
        let today = self.today();
        let store = self.fresh_store().await;
        select_due(store.passes(), today, window_days)
            .into_iter()
            .map(|due| PassView {
                status: PassStatus::Active,
                days_remaining: due.days_remaining,
                pass: due.pass,
            })
            .collect()
    }

    // ── Daily check ──────────────────────────────────────────────────────────

    /// Run the daily check for today.
    ///
    /// # Errors
    ///
    /// `Persistence` if the expiry sweep cannot be saved.
    pub async fn run_daily_check(&self) -> Result<DailyCheckReport> {
        self.run_daily_check_for(self.today()).await
    }

    /// Run the daily check as of `day`.
    ///
    /// # Errors
    ///
    /// `Persistence` if the expiry sweep cannot be saved.
    pub async fn run_daily_check_for(&self, day: NaiveDate) -> Result<DailyCheckReport> {
        self.inner.daily.run_for(day).await
    }

    // ── Scheduler ────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// `Scheduler` if already running or stopped.
    pub fn start_scheduler(&self) -> Result<()> {
        self.inner.scheduler.start()
    }

    /// # Errors
    ///
    /// `Scheduler` if the loop task panicked.
    pub async fn stop_scheduler(&self) -> Result<()> {
        self.inner.scheduler.stop().await
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    // ── Mail ─────────────────────────────────────────────────────────────────

    /// Send a sample reminder to `address` through the current mailer.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed address, `Delivery` if the relay fails.
    pub async fn send_test_email(&self, address: &str) -> Result<()> {
        validate_email(address)?;
        let mailer = Arc::clone(&*self.inner.mailer.read().await);
        let message = render_reminder(TEST_RECIPIENT_NAME, TEST_PASS_NAME, TEST_DAYS_REMAINING);
        mailer
            .send(&OutgoingMail {
                from: mailer.sender().to_owned(),
                to: address.to_owned(),
                subject: message.subject,
                body: message.body,
            })
            .await?;
        info!(to = address, "test email sent");
        Ok(())
    }

    /// Build a new relay client from `config` and make it current.
    ///
    /// In-flight sends finish on the previous client.
    ///
    /// # Errors
    ///
    /// Any error from [`SmtpMailer::from_config`]; the current mailer is kept.
    pub async fn reconfigure_mailer(&self, config: &MailConfig) -> Result<()> {
        let mailer = SmtpMailer::from_config(config, self.inner.credentials.as_ref())?;
        self.replace_mailer(Arc::new(mailer)).await;
        Ok(())
    }

    /// Swap in `mailer` for subsequent sends.
    pub async fn replace_mailer(&self, mailer: Arc<dyn Mailer>) {
        *self.inner.mailer.write().await = mailer;
        info!("mailer replaced");
    }

    // ── Reports ──────────────────────────────────────────────────────────────

    pub async fn report(&self, kind: ReportKind) -> Report {
        let today = self.today();
        let store = self.fresh_store().await;
        Report::build(kind, &store, today, self.inner.window_days)
    }
}
