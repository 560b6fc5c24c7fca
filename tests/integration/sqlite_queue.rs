//! SQLite queue integration tests.
//!
//! Tests that scheduling passes against a file-backed queue survive a
//! reconnect and that clearing the scheduler's entries leaves others alone.

use crate::common::{chicago, queued_times, write_config};
use foresight::{
    JobQueue, NewEntry, SchedulerJob, SqliteQueue, TaskConfigBuilder, delete_all_scheduled,
    existing_run_times,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const HOURLY: &str = r#"
tz: America/Chicago
hourly_task:
  class: HourlyJob
  every: 1.hour
  at: "*:00"
"#;

/// Test: Runs queued by one process are seen by the next.
#[tokio::test]
async fn test_pass_survives_reconnect() {
    let (_config_dir, config) = write_config(HOURLY);
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("queue.db");
    let now = chicago("2016-12-01 20:00", "CST");

    {
        let queue = Arc::new(SqliteQueue::new(&db_path).await.unwrap());
        let scheduler = SchedulerJob::load(queue.clone(), Some(config.as_path())).unwrap();
        let report = scheduler.run_pass_at(now).await.unwrap();
        assert_eq!(report.submitted.len(), 7);
        queue.close().await;
    }

    let queue = Arc::new(SqliteQueue::new(&db_path).await.unwrap());
    let scheduler = SchedulerJob::load(queue.clone(), Some(config.as_path())).unwrap();

    let report = scheduler.run_pass_at(now).await.unwrap();
    assert!(report.submitted.is_empty());

    let times = queued_times(queue.as_ref(), "hourly_task").await;
    assert_eq!(times.len(), 7);
    assert_eq!(times[0], chicago("2016-12-01 20:00", "CST"));
    assert_eq!(times[6], chicago("2016-12-02 02:00", "CST"));

    // Timezone of the task comes back from the stored payload
    let (_, built) = TaskConfigBuilder::new(scheduler.config())
        .build_all(scheduler.config())
        .remove(0);
    let spec = built.unwrap();
    let existing = existing_run_times(queue.as_ref(), &spec).await.unwrap();
    assert_eq!(existing[0].timezone(), chrono_tz::America::Chicago);
}

/// Test: Clearing removes only what the scheduler queued.
#[tokio::test]
async fn test_clear_keeps_foreign_entries() {
    let (_config_dir, config) = write_config(HOURLY);
    let db_dir = TempDir::new().unwrap();
    let queue = Arc::new(SqliteQueue::new(db_dir.path().join("queue.db")).await.unwrap());
    let now = chicago("2016-12-01 20:00", "CST");

    SchedulerJob::load(queue.clone(), Some(config.as_path()))
        .unwrap()
        .run_pass_at(now)
        .await
        .unwrap();
    queue
        .enqueue_at(now, NewEntry::new("Mailer", "mail", json!(["ops@example.com"])))
        .await
        .unwrap();

    let deleted = delete_all_scheduled(queue.as_ref()).await.unwrap();

    assert_eq!(deleted, 7);
    let remaining = queue.scheduled().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].class.as_str(), "Mailer");
    assert_eq!(remaining[0].queue, "mail");
}

/// Test: Due entries are taken once and leave the rest queued.
#[tokio::test]
async fn test_take_due_removes_taken_entries() {
    let (_config_dir, config) = write_config(HOURLY);
    let db_dir = TempDir::new().unwrap();
    let queue = Arc::new(SqliteQueue::new(db_dir.path().join("queue.db")).await.unwrap());
    let now = chicago("2016-12-01 20:00", "CST");

    SchedulerJob::load(queue.clone(), Some(config.as_path()))
        .unwrap()
        .run_pass_at(now)
        .await
        .unwrap();

    let later = chicago("2016-12-01 22:00", "CST");
    let taken = queue.take_due(later).await.unwrap();
    assert_eq!(taken.len(), 3);
    assert!(taken.windows(2).all(|w| w[0].run_at <= w[1].run_at));
    assert!(queue.take_due(later).await.unwrap().is_empty());
    assert_eq!(queue.scheduled().await.unwrap().len(), 4);
}
