//! Daily check: sweep, reminder window, per-item failures, ledger dedupe.

use crate::helpers::{
    SENDER, csv_service, day, employee, memory_service, pass_type, seed_reminder_window,
};
use safepass::notify::DeliveryLedger;
use safepass::{PassError, PassStatus};

#[tokio::test]
async fn reminders_cover_one_to_fifteen_days() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;

    let report = service.run_daily_check().await.unwrap();
    assert_eq!(report.day, day("2025-03-20"));
    assert_eq!(report.sent, vec!["PASS001".to_owned(), "PASS002".to_owned()]);
    assert!(report.failed.is_empty());

    let sent = mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "john.smith@company.com");
    assert_eq!(sent[0].from, SENDER);
    assert_eq!(sent[0].subject, "Safety Pass Expiry Reminder - Hot Work Permit");
    assert!(sent[0].body.contains("will expire TOMORROW"));
    assert_eq!(sent[1].to, "alice.johnson@company.com");
    assert!(sent[1].body.contains("will expire in 15 days"));
}

#[tokio::test]
async fn expiring_passes_match_the_window() {
    let (service, _mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;

    let views = service.get_expiring_passes(15).await;
    let ids: Vec<&str> = views.iter().map(|v| v.pass.pass_id.as_str()).collect();
    assert_eq!(ids, vec!["PASS001", "PASS002"]);
    assert_eq!(views[0].days_remaining, 1);

    assert_eq!(service.get_expiring_passes(16).await.len(), 3);
}

#[tokio::test]
async fn send_failure_does_not_stop_the_batch() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;
    mailer.fail_for("john.smith@company.com");

    let report = service.run_daily_check().await.unwrap();
    assert_eq!(report.sent, vec!["PASS002".to_owned()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].pass_id, "PASS001");
    assert_eq!(report.failed[0].employee_id, "EMP001");
    assert_eq!(mailer.recipients(), vec!["alice.johnson@company.com"]);
}

#[tokio::test]
async fn sweep_runs_before_selection() {
    let (service, mailer, _storage) = memory_service("2025-03-22");
    seed_reminder_window(&service).await;

    // PASS001 expired on 2025-03-21.
    let report = service.run_daily_check().await.unwrap();
    assert_eq!(report.expired, vec!["PASS001".to_owned()]);
    assert_eq!(report.sent, vec!["PASS002".to_owned(), "PASS003".to_owned()]);
    assert!(!mailer.recipients().contains(&"john.smith@company.com".to_owned()));

    let views = service.list_passes().await;
    assert_eq!(views[0].pass.status, PassStatus::Expired);
}

#[tokio::test]
async fn sweep_persistence_failure_sends_nothing() {
    let (service, mailer, storage) = memory_service("2025-03-22");
    seed_reminder_window(&service).await;
    storage.set_fail_writes(true);

    let err = service.run_daily_check().await.unwrap_err();
    assert!(matches!(err, PassError::Persistence(_)));
    assert!(mailer.sent().is_empty());
    assert_eq!(service.list_passes().await[0].pass.status, PassStatus::Active);
}

#[tokio::test]
async fn dangling_references_are_skipped() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;
    service.remove_employee("EMP001").await.unwrap();

    let report = service.run_daily_check().await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].pass_id, "PASS001");
    assert!(report.skipped[0].reason.contains("EMP001"));
    assert_eq!(report.sent, vec!["PASS002".to_owned()]);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn ledger_suppresses_second_same_day_reminder() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, mailer) = csv_service(temp.path(), "2025-03-20");
    seed_reminder_window(&service).await;
    mailer.fail_for("alice.johnson@company.com");

    let first = service.run_daily_check().await.unwrap();
    assert_eq!(first.sent, vec!["PASS001".to_owned()]);
    assert_eq!(first.failed.len(), 1);

    // A fresh process on the same day only retries the failed reminder.
    let (service, mailer) = csv_service(temp.path(), "2025-03-20");
    let second = service.run_daily_check().await.unwrap();
    assert_eq!(second.sent, vec!["PASS002".to_owned()]);
    assert_eq!(second.skipped.len(), 1);
    assert_eq!(second.skipped[0].pass_id, "PASS001");
    assert_eq!(mailer.recipients(), vec!["alice.johnson@company.com"]);

    let mut ledger = DeliveryLedger::in_data_dir(temp.path());
    ledger.begin_day(day("2025-03-20")).await.unwrap();
    assert!(ledger.is_delivered("PASS001", day("2025-03-20")));
    assert!(ledger.is_delivered("PASS002", day("2025-03-20")));
}

#[tokio::test]
async fn ledger_keeps_only_the_current_day() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, _mailer) = csv_service(temp.path(), "2025-03-20");
    seed_reminder_window(&service).await;
    service.run_daily_check().await.unwrap();

    let (service, mailer) = csv_service(temp.path(), "2025-03-21");
    let report = service.run_daily_check().await.unwrap();
    assert_eq!(report.sent, vec!["PASS002".to_owned(), "PASS003".to_owned()]);
    assert_eq!(mailer.sent().len(), 2);

    let ledger = std::fs::read_to_string(temp.path().join(safepass::notify::LEDGER_FILE)).unwrap();
    assert_eq!(ledger.lines().count(), 2);
    assert!(ledger.lines().all(|line| line.contains("2025-03-21")));
}

#[tokio::test]
async fn test_email_uses_sample_content() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    service.send_test_email("ops@company.com").await.unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Safety Pass Expiry Reminder - Test Safety Pass");
    assert!(sent[0].body.starts_with("Dear Test User,"));
    assert!(sent[0].body.contains("will expire in 5 days"));
}

#[tokio::test]
async fn reconfigure_rejects_bad_settings_and_keeps_mailer() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();

    let mut bad = safepass::config::MailConfig::default();
    bad.smtp_port = 0;
    assert!(service.reconfigure_mailer(&bad).await.is_err());

    service.send_test_email("ops@company.com").await.unwrap();
    assert_eq!(mailer.sent().len(), 1);
}
