//! Shared helpers for integration tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use safepass::notify::{DeliveryLedger, Mailer, OutgoingMail};
use safepass::records::parse_date;
use safepass::scheduler::Today;
use safepass::storage::{CsvStorage, MemoryStorage};
use safepass::{Employee, PassError, PassService, PassType, RecordStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub(crate) const SENDER: &str = "safety@company.com";

/// Mailer test double that records accepted mail and fails for chosen recipients.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub(crate) fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_owned());
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|mail| mail.to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn sender(&self) -> &str {
        SENDER
    }

    async fn send(&self, mail: &OutgoingMail) -> safepass::Result<()> {
        if self.failing.lock().unwrap().contains(&mail.to) {
            return Err(PassError::Delivery(format!("relay refused {}", mail.to)));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub(crate) fn day(raw: &str) -> NaiveDate {
    parse_date(raw).expect("valid date")
}

pub(crate) fn fixed_today(raw: &str) -> Today {
    let today = day(raw);
    Arc::new(move || today)
}

pub(crate) fn employee(id: &str, name: &str, email: &str) -> Employee {
    Employee {
        employee_id: id.to_owned(),
        name: name.to_owned(),
        email: email.to_owned(),
        department: "Construction".to_owned(),
        manager: "Mike Wilson".to_owned(),
    }
}

pub(crate) fn pass_type(id: &str, name: &str, validity_period_days: u32) -> PassType {
    PassType {
        pass_type_id: id.to_owned(),
        name: name.to_owned(),
        description: format!("{name} certification"),
        category: "Safety".to_owned(),
        validity_period_days,
    }
}

/// Service over in-memory storage with a recording mailer and no ledger.
pub(crate) fn memory_service(today: &str) -> (PassService, Arc<RecordingMailer>, MemoryStorage) {
    let storage = MemoryStorage::new();
    let store = RecordStore::open(Box::new(storage.clone())).expect("open store");
    let mailer = Arc::new(RecordingMailer::default());
    let service = PassService::builder(store, mailer.clone())
        .with_today(fixed_today(today))
        .build();
    (service, mailer, storage)
}

/// Service over CSV files in `dir` with a recording mailer, the delivery
/// ledger and persisted scheduler state.
pub(crate) fn csv_service(dir: &Path, today: &str) -> (PassService, Arc<RecordingMailer>) {
    let storage = CsvStorage::new(dir);
    storage.ensure_layout().expect("layout");
    let store = RecordStore::open(Box::new(storage)).expect("open store");
    let mailer = Arc::new(RecordingMailer::default());
    let service = PassService::builder(store, mailer.clone())
        .with_today(fixed_today(today))
        .with_delivery_ledger(DeliveryLedger::in_data_dir(dir))
        .with_state_path(safepass::scheduler::state_path_in(dir))
        .build();
    (service, mailer)
}

/// John (expires in 1 day), Alice (15 days), Bob (16 days) as of 2025-03-20.
pub(crate) async fn seed_reminder_window(service: &PassService) {
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    service
        .add_employee(employee("EMP002", "Alice Johnson", "alice.johnson@company.com"))
        .await
        .unwrap();
    service
        .add_employee(employee("EMP003", "Bob Wilson", "bob.wilson@company.com"))
        .await
        .unwrap();
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();

    // 90-day validity: issued 2024-12-21 expires 2025-03-21.
    service
        .issue_pass("PASS001", "EMP001", "HOT_WORK", Some(day("2024-12-21")))
        .await
        .unwrap();
    service
        .issue_pass("PASS002", "EMP002", "HOT_WORK", Some(day("2025-01-04")))
        .await
        .unwrap();
    service
        .issue_pass("PASS003", "EMP003", "HOT_WORK", Some(day("2025-01-05")))
        .await
        .unwrap();
}
