//! Scheduler driving the real daily check.

use crate::helpers::{csv_service, day, memory_service, seed_reminder_window};
use safepass::SchedulerState;
use std::time::Duration;

#[tokio::test]
async fn one_cycle_per_calendar_day() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;
    let scheduler = service.scheduler();

    let record = scheduler
        .poll_once(day("2025-03-20"))
        .await
        .unwrap()
        .expect("first poll runs");
    assert_eq!(record.sent, 2);

    // Hourly polls later the same day do nothing.
    for _ in 0..3 {
        assert!(
            scheduler
                .poll_once(day("2025-03-20"))
                .await
                .unwrap()
                .is_none()
        );
    }
    assert_eq!(mailer.sent().len(), 2);

    // Next day: John's pass expires today, Alice (14 days) and Bob (15 days) are due.
    let next = scheduler
        .poll_once(day("2025-03-21"))
        .await
        .unwrap()
        .expect("new day runs");
    assert_eq!(next.sent, 2);
    assert_eq!(mailer.sent().len(), 4);
}

#[tokio::test]
async fn failed_sends_still_mark_the_day() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;
    mailer.fail_for("john.smith@company.com");
    mailer.fail_for("alice.johnson@company.com");

    let scheduler = service.scheduler();
    let record = scheduler
        .poll_once(day("2025-03-20"))
        .await
        .unwrap()
        .expect("cycle ran");
    assert_eq!(record.failed, 2);
    assert_eq!(
        scheduler.snapshot().await.last_processed_day,
        Some(day("2025-03-20"))
    );
    assert!(
        scheduler
            .poll_once(day("2025-03-20"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn restart_on_same_day_does_not_repeat_cycle() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let (service, _mailer) = csv_service(temp.path(), "2025-03-20");
        seed_reminder_window(&service).await;
        service
            .scheduler()
            .poll_once(day("2025-03-20"))
            .await
            .unwrap()
            .expect("cycle ran");
    }

    let (service, mailer) = csv_service(temp.path(), "2025-03-20");
    assert!(
        service
            .scheduler()
            .poll_once(day("2025-03-20"))
            .await
            .unwrap()
            .is_none()
    );
    assert!(mailer.sent().is_empty());
    assert!(temp.path().join("scheduler.json").exists());
}

#[tokio::test]
async fn start_and_stop_through_the_service() {
    let (service, mailer, _storage) = memory_service("2025-03-20");
    seed_reminder_window(&service).await;
    assert_eq!(service.scheduler_state(), SchedulerState::Idle);

    service.start_scheduler().unwrap();
    assert_eq!(service.scheduler_state(), SchedulerState::Running);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while mailer.sent().len() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(mailer.sent().len(), 2);

    service.stop_scheduler().await.unwrap();
    assert_eq!(service.scheduler_state(), SchedulerState::Stopped);
    assert!(service.start_scheduler().is_err());
}
