//! Scheduling pass integration tests.
//!
//! Tests that drive whole passes from a config file against an in-memory
//! queue and check what ends up queued.

use crate::common::{chicago, queued_times, write_config};
use chrono::Duration;
use foresight::{InMemoryQueue, JobQueue, SchedulerJob};
use std::sync::Arc;

const CONFIG: &str = r#"
queue_ahead: 360
tz: America/Chicago

hourly_task:
  class: HourlyJob
  every: 1.hour
  at: "*:00"

weekly_task:
  class: WeeklyJob
  every: 1.week
  at: "0:00"

frequent_task:
  class: FrequentJob
  every: 15.minutes
  at: "*:00"
  queue_ahead: 60
"#;

fn scheduler(path: &std::path::Path) -> SchedulerJob<InMemoryQueue> {
    SchedulerJob::load(Arc::new(InMemoryQueue::new()), Some(path)).unwrap()
}

/// Test: A pass from a config file fills every task's window.
#[tokio::test]
async fn test_pass_from_config_file() {
    let (_dir, path) = write_config(CONFIG);
    let scheduler = scheduler(&path);
    let now = chicago("2016-12-01 20:00", "CST");

    let report = scheduler.run_pass_at(now).await.unwrap();

    assert!(report.skipped.is_empty());
    assert_eq!(report.submitted_for("hourly_task").count(), 7);
    assert_eq!(report.submitted_for("weekly_task").count(), 2);
    assert_eq!(report.submitted_for("frequent_task").count(), 5);

    let queue = scheduler.queue().as_ref();
    assert_eq!(
        queued_times(queue, "weekly_task").await,
        vec![
            chicago("2016-12-02 00:00", "CST"),
            chicago("2016-12-09 00:00", "CST"),
        ]
    );

    let hourly = queued_times(queue, "hourly_task").await;
    assert_eq!(hourly.first(), Some(&chicago("2016-12-01 20:00", "CST")));
    assert_eq!(hourly.last(), Some(&chicago("2016-12-02 02:00", "CST")));
}

/// Test: Running the pass twice without time passing submits nothing new.
#[tokio::test]
async fn test_pass_is_idempotent() {
    let (_dir, path) = write_config(CONFIG);
    let scheduler = scheduler(&path);
    let now = chicago("2016-12-01 20:00", "CST");

    let first = scheduler.run_pass_at(now).await.unwrap();
    let second = scheduler.run_pass_at(now).await.unwrap();

    assert_eq!(first.submitted.len(), 14);
    assert!(second.submitted.is_empty());
    assert_eq!(scheduler.queue().scheduled().await.unwrap().len(), 14);
}

/// Test: A later pass only tops up what the window now needs.
#[tokio::test]
async fn test_later_pass_tops_up_window() {
    let (_dir, path) = write_config(CONFIG);
    let scheduler = scheduler(&path);
    let now = chicago("2016-12-01 20:00", "CST");

    scheduler.run_pass_at(now).await.unwrap();
    let report = scheduler
        .run_pass_at(now + Duration::hours(1))
        .await
        .unwrap();

    let hourly: Vec<_> = report
        .submitted_for("hourly_task")
        .map(|s| s.run_at.to_utc())
        .collect();
    assert_eq!(hourly, vec![chicago("2016-12-02 03:00", "CST")]);
    assert_eq!(report.submitted_for("frequent_task").count(), 4);
    assert_eq!(report.submitted_for("weekly_task").count(), 0);
}

/// Test: Tasks sharing a class keep separate queues of runs.
#[tokio::test]
async fn test_tasks_sharing_class_do_not_dedup_each_other() {
    let (_dir, path) = write_config(
        r#"
tz: America/Chicago
morning_report:
  class: ReportJob
  every: 1.day
  at: "8:00"
evening_report:
  class: ReportJob
  every: 1.day
  at: "20:00"
"#,
    );
    let scheduler = scheduler(&path);
    let now = chicago("2016-12-01 12:00", "CST");

    scheduler.run_pass_at(now).await.unwrap();
    let queue = scheduler.queue().as_ref();

    assert_eq!(
        queued_times(queue, "morning_report").await,
        vec![
            chicago("2016-12-02 08:00", "CST"),
            chicago("2016-12-03 08:00", "CST"),
        ]
    );
    assert_eq!(
        queued_times(queue, "evening_report").await,
        vec![
            chicago("2016-12-01 20:00", "CST"),
            chicago("2016-12-02 20:00", "CST"),
        ]
    );
}

/// Test: Entries are queued in the task's lane with its arguments.
#[tokio::test]
async fn test_queue_lane_and_arguments_travel_with_entry() {
    let (_dir, path) = write_config(
        r#"
cleanup:
  class: CleanupJob
  every: 1.day
  at: "3:00"
  queue_name: maintenance
  arguments: ["tmp", 7]
"#,
    );
    let scheduler = scheduler(&path);
    scheduler
        .run_pass_at(chicago("2016-12-01 12:00", "CST"))
        .await
        .unwrap();

    let entries = scheduler.queue().scheduled().await.unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry.queue, "maintenance");
        assert_eq!(entry.payload["task"]["arguments"], serde_json::json!(["tmp", 7]));
        assert_eq!(entry.payload["task"]["tz"], "UTC");
    }
}

/// Test: The sample config shipped with the crate builds cleanly.
#[tokio::test]
async fn test_sample_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/foresight.yml");
    let scheduler = scheduler(&path);

    let report = scheduler
        .run_pass_at(chicago("2016-12-01 20:00", "CST"))
        .await
        .unwrap();

    assert!(report.skipped.is_empty(), "{:?}", report.skipped);
    for task in ["hourly_digest", "nightly_cleanup", "weekly_report", "heartbeat"] {
        assert!(report.submitted_for(task).count() >= 2, "{}", task);
    }
}
