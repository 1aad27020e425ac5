//! Issue / expire / revoke behaviour through the service surface.

use crate::helpers::{day, employee, memory_service, pass_type};
use safepass::expiry::{compute_status, days_until_expiry, sweep_expirations};
use safepass::notify::select_due;
use safepass::{EmployeeUpdate, PassError, PassStatus, RecordKind};

#[tokio::test]
async fn hot_work_pass_lifecycle() {
    let (service, _mailer, _storage) = memory_service("2025-03-20");
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();

    let issued = service
        .issue_pass("PASS001", "EMP001", "HOT_WORK", Some(day("2025-01-01")))
        .await
        .unwrap();
    assert_eq!(issued.expiry_date, day("2025-04-01"));
    assert_eq!(issued.status, PassStatus::Active);

    // Active with 12 days to go.
    let now = day("2025-03-20");
    assert_eq!(compute_status(&issued, now), PassStatus::Active);
    assert_eq!(days_until_expiry(&issued, now), 12);

    // The day after expiry the sweep flips it and reminders skip it.
    let later = day("2025-04-02");
    let mut passes = vec![issued.clone()];
    let outcome = sweep_expirations(passes.iter_mut(), later);
    assert_eq!(outcome.changed, vec!["PASS001".to_owned()]);
    assert_eq!(passes[0].status, PassStatus::Expired);
    assert!(select_due(&passes, later, 15).is_empty());
}

#[tokio::test]
async fn revoked_pass_stays_revoked_after_expiry() {
    let (service, _mailer, _storage) = memory_service("2025-02-01");
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();
    service
        .issue_pass("PASS001", "EMP001", "HOT_WORK", Some(day("2025-01-01")))
        .await
        .unwrap();

    let revoked = service.revoke_pass("PASS001").await.unwrap();
    assert_eq!(revoked.status, PassStatus::Revoked);

    let report = service
        .run_daily_check_for(day("2025-04-02"))
        .await
        .unwrap();
    assert!(report.expired.is_empty());

    let views = service.get_passes_for_employee("EMP001").await.unwrap();
    assert_eq!(views[0].status, PassStatus::Revoked);
    assert_eq!(compute_status(&views[0].pass, day("2025-04-02")), PassStatus::Revoked);
}

#[tokio::test]
async fn revoke_rules() {
    let (service, _mailer, _storage) = memory_service("2025-03-20");
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();
    service
        .issue_pass("PASS001", "EMP001", "HOT_WORK", None)
        .await
        .unwrap();
    service
        .issue_pass("PASS002", "EMP001", "HOT_WORK", Some(day("2024-01-01")))
        .await
        .unwrap();

    service.revoke_pass("PASS001").await.unwrap();
    let again = service.revoke_pass("PASS001").await.unwrap();
    assert_eq!(again.status, PassStatus::Revoked);

    service.run_daily_check().await.unwrap();
    let err = service.revoke_pass("PASS002").await.unwrap_err();
    assert!(matches!(err, PassError::Validation(_)));

    let err = service.revoke_pass("PASS404").await.unwrap_err();
    assert!(matches!(
        err,
        PassError::NotFound {
            kind: RecordKind::Pass,
            ..
        }
    ));
}

#[tokio::test]
async fn issuing_requires_known_references() {
    let (service, _mailer, _storage) = memory_service("2025-03-20");
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();

    let err = service
        .issue_pass("PASS001", "EMP404", "HOT_WORK", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PassError::NotFound {
            kind: RecordKind::Employee,
            ..
        }
    ));

    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    let err = service
        .issue_pass("PASS001", "EMP001", "NOPE", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PassError::NotFound {
            kind: RecordKind::PassType,
            ..
        }
    ));
    assert!(service.list_passes().await.is_empty());
}

#[tokio::test]
async fn failed_save_leaves_records_unchanged() {
    let (service, _mailer, storage) = memory_service("2025-03-20");
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();

    storage.set_fail_writes(true);
    let err = service
        .add_employee(employee("EMP002", "Alice Johnson", "alice.johnson@company.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, PassError::Persistence(_)));

    let update = EmployeeUpdate {
        name: Some("Johnny Smith".to_owned()),
        ..EmployeeUpdate::default()
    };
    assert!(service.update_employee("EMP001", &update).await.is_err());

    let employees = service.list_employees().await;
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0].name, "John Smith");

    storage.set_fail_writes(false);
    service.update_employee("EMP001", &update).await.unwrap();
    assert_eq!(service.list_employees().await[0].name, "Johnny Smith");
}

#[tokio::test]
async fn removing_an_employee_keeps_their_passes() {
    let (service, _mailer, _storage) = memory_service("2025-03-20");
    service
        .add_employee(employee("EMP001", "John Smith", "john.smith@company.com"))
        .await
        .unwrap();
    service
        .add_pass_type(pass_type("HOT_WORK", "Hot Work Permit", 90))
        .await
        .unwrap();
    service
        .issue_pass("PASS001", "EMP001", "HOT_WORK", None)
        .await
        .unwrap();

    service.remove_employee("EMP001").await.unwrap();
    assert_eq!(service.list_passes().await.len(), 1);

    let report = service
        .report(safepass::ReportKind::Active)
        .await
        .to_string();
    assert!(report.contains("Unknown"));
}
