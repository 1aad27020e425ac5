//! CSV files on disk: headers, reload, and what the daily check writes.

use crate::helpers::{csv_service, day, seed_reminder_window};
use safepass::storage::RecordSet;
use safepass::storage::{CsvStorage, EMPLOYEES_FILE, PASS_TYPES_FILE, PASSES_FILE, RecordStorage};
use safepass::{PassService, PassStatus, SafePassConfig};

fn first_line(path: &std::path::Path) -> String {
    std::fs::read_to_string(path)
        .expect("read file")
        .lines()
        .next()
        .unwrap_or_default()
        .to_owned()
}

#[tokio::test]
async fn files_carry_exact_headers() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (service, _mailer) = csv_service(temp.path(), "2025-03-20");
    seed_reminder_window(&service).await;

    assert_eq!(
        first_line(&temp.path().join(EMPLOYEES_FILE)),
        "employee_id,name,email,department,manager"
    );
    assert_eq!(
        first_line(&temp.path().join(PASS_TYPES_FILE)),
        "pass_type_id,name,description,category,validity_period_days"
    );
    assert_eq!(
        first_line(&temp.path().join(PASSES_FILE)),
        "pass_id,employee_id,pass_type_id,issue_date,expiry_date,status"
    );

    let passes = std::fs::read_to_string(temp.path().join(PASSES_FILE)).unwrap();
    assert!(passes.contains("PASS001,EMP001,HOT_WORK,2024-12-21,2025-03-21,active"));
}

#[tokio::test]
async fn records_survive_reload() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let (service, _mailer) = csv_service(temp.path(), "2025-03-20");
        seed_reminder_window(&service).await;
        service.revoke_pass("PASS003").await.unwrap();
    }

    let loaded = CsvStorage::new(temp.path()).load().unwrap();
    assert_eq!(loaded.employees.len(), 3);
    assert_eq!(loaded.pass_types.len(), 1);
    assert_eq!(loaded.pass_types[0].validity_period_days, 90);
    let revoked = loaded
        .passes
        .iter()
        .find(|p| p.pass_id == "PASS003")
        .expect("PASS003");
    assert_eq!(revoked.status, PassStatus::Revoked);
    assert_eq!(revoked.expiry_date, day("2025-04-05"));
}

#[tokio::test]
async fn sweep_is_written_back() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let (service, _mailer) = csv_service(temp.path(), "2025-03-20");
        seed_reminder_window(&service).await;
    }

    let (service, _mailer) = csv_service(temp.path(), "2025-03-22");
    let report = service.run_daily_check().await.unwrap();
    assert_eq!(report.expired, vec!["PASS001".to_owned()]);

    let passes = std::fs::read_to_string(temp.path().join(PASSES_FILE)).unwrap();
    assert!(passes.contains("PASS001,EMP001,HOT_WORK,2024-12-21,2025-03-21,expired"));
}

#[tokio::test]
async fn service_from_config_creates_empty_layout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut config = SafePassConfig::default();
    config.storage.data_dir = temp.path().join("data");

    let service = PassService::from_config(&config).unwrap();
    assert!(service.list_employees().await.is_empty());
    for file in [EMPLOYEES_FILE, PASS_TYPES_FILE, PASSES_FILE] {
        assert!(temp.path().join("data").join(file).exists(), "{file} missing");
    }
}

#[tokio::test]
async fn scheduler_process_sees_passes_issued_elsewhere() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (scheduler_side, mailer) = csv_service(temp.path(), "2025-03-22");
    seed_reminder_window(&scheduler_side).await;

    // A separate admin invocation on the same data directory.
    let (admin_side, _admin_mailer) = csv_service(temp.path(), "2025-03-22");
    admin_side
        .issue_pass("PASS004", "EMP001", "HOT_WORK", Some(day("2024-12-25")))
        .await
        .unwrap();

    let report = scheduler_side
        .run_daily_check_for(day("2025-03-22"))
        .await
        .unwrap();
    assert_eq!(report.expired, vec!["PASS001".to_owned()]);
    assert_eq!(
        report.sent,
        vec![
            "PASS004".to_owned(),
            "PASS002".to_owned(),
            "PASS003".to_owned()
        ]
    );
    assert_eq!(mailer.recipients()[0], "john.smith@company.com");

    let on_disk: RecordSet = CsvStorage::new(temp.path()).load().unwrap();
    let ids: Vec<&str> = on_disk.passes.iter().map(|p| p.pass_id.as_str()).collect();
    assert_eq!(ids, vec!["PASS001", "PASS002", "PASS003", "PASS004"]);
    assert_eq!(on_disk.passes[0].status, PassStatus::Expired);
    assert_eq!(on_disk.passes[3].status, PassStatus::Active);
}
