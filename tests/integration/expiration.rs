//! Expiration integration tests.
//!
//! Tests that queue runs through a scheduling pass, pick them up late with
//! the worker, and check which ones run and which are reported as expired.

use crate::common::chicago;
use chrono::Duration;
use foresight::testing::{RecordingJob, RecordingObserver, TestHarness};
use foresight::{
    FutureJob, HandlerRegistry, InMemoryQueue, JobQueue, JobRun, ObserverRegistry, Outcome,
    SchedulerJob, Worker,
};
use serde_json::json;
use std::sync::Arc;

const HOURLY_WITH_WINDOW: &str = r#"
tz: America/Chicago
hourly_report:
  class: ReportJob
  every: 1.hour
  at: "*:00"
  expires_after: 30.minutes
  arguments: ["summary"]
"#;

/// Test: A run picked up inside its window executes with its scheduled time.
#[tokio::test]
async fn test_run_within_window_executes() {
    let job = Arc::new(RecordingJob::new());
    let harness = TestHarness::from_yaml(HOURLY_WITH_WINDOW)
        .unwrap()
        .with_job("ReportJob", job.clone());
    let now = chicago("2016-12-01 20:00", "CST");

    harness.run_pass_at(now).await.unwrap();
    let handled = harness.tick_at(now + Duration::minutes(29)).await.unwrap();

    assert_eq!(handled.len(), 1);
    assert!(matches!(handled[0].result, Ok(Outcome::Executed)));
    assert!(harness.expired().is_empty());

    match &job.runs()[0] {
        JobRun::Scheduled(run) => {
            assert_eq!(run.task_name.as_str(), "hourly_report");
            assert_eq!(run.scheduled_time.to_utc(), now);
            assert_eq!(run.arguments, vec![json!("summary")]);
        }
        other => panic!("Expected a scheduled run, got {:?}", other),
    }
}

/// Test: A run picked up past its window is skipped and reported once.
#[tokio::test]
async fn test_run_past_window_is_reported() {
    let job = Arc::new(RecordingJob::new());
    let harness = TestHarness::from_yaml(HOURLY_WITH_WINDOW)
        .unwrap()
        .with_job("ReportJob", job.clone());
    let now = chicago("2016-12-01 20:00", "CST");

    harness.run_pass_at(now).await.unwrap();
    let handled = harness.tick_at(now + Duration::minutes(31)).await.unwrap();

    assert_eq!(handled.len(), 1);
    assert_eq!(job.run_count(), 0);

    let expired = harness.expired();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].task_name.as_str(), "hourly_report");
    assert_eq!(expired[0].class.as_str(), "ReportJob");
    assert_eq!(expired[0].scheduled_time.to_utc(), now);
    assert_eq!(expired[0].run_time, now + Duration::minutes(31));
    assert_eq!(expired[0].lateness(), Duration::minutes(31));

    // Expired runs are not re-queued
    assert_eq!(harness.queue().scheduled().await.unwrap().len(), 6);
}

/// Test: A late tick handles each due run on its own merits.
#[tokio::test]
async fn test_backlog_mixes_expired_and_fresh_runs() {
    let job = Arc::new(RecordingJob::new());
    let harness = TestHarness::from_yaml(HOURLY_WITH_WINDOW)
        .unwrap()
        .with_job("ReportJob", job.clone());
    let now = chicago("2016-12-01 20:00", "CST");

    harness.run_pass_at(now).await.unwrap();
    // 20:00 is 70 minutes late, 21:00 is 10 minutes late
    let handled = harness.tick_at(now + Duration::minutes(70)).await.unwrap();

    assert_eq!(handled.len(), 2);
    assert_eq!(job.run_count(), 1);
    assert_eq!(harness.expired().len(), 1);
    assert_eq!(harness.expired()[0].scheduled_time.to_utc(), now);
}

/// Test: A job that takes no schedule gets only the task's arguments.
#[tokio::test]
async fn test_bare_job_gets_arguments_only() {
    let job = Arc::new(RecordingJob::bare());
    let harness = TestHarness::from_yaml(HOURLY_WITH_WINDOW)
        .unwrap()
        .with_job("ReportJob", job.clone());
    let now = chicago("2016-12-01 20:00", "CST");

    harness.run_pass_at(now).await.unwrap();
    harness.tick_at(now).await.unwrap();

    assert_eq!(
        job.runs(),
        vec![JobRun::Bare {
            arguments: vec![json!("summary")]
        }]
    );
}

/// Test: A failing job is reported and does not expire anything.
#[tokio::test]
async fn test_job_failure_is_reported_per_entry() {
    let job = Arc::new(RecordingJob::new().failing(1));
    let harness = TestHarness::from_yaml(HOURLY_WITH_WINDOW)
        .unwrap()
        .with_job("ReportJob", job.clone());
    let now = chicago("2016-12-01 20:00", "CST");

    harness.run_pass_at(now).await.unwrap();
    let first = harness.tick_at(now).await.unwrap();
    let second = harness.tick_at(now + Duration::hours(1)).await.unwrap();

    assert!(first[0].result.is_err());
    assert!(matches!(second[0].result, Ok(Outcome::Executed)));
    assert_eq!(job.run_count(), 2);
    assert!(harness.expired().is_empty());
}

/// Test: Observers registered on the process-wide registry hear about
/// expirations from a worker built with the default observers.
#[tokio::test]
async fn test_global_registry_receives_reports() {
    let observer = Arc::new(RecordingObserver::new());
    ObserverRegistry::global().register(observer.clone());

    let (_dir, path) = crate::common::write_config(
        r#"
tz: America/Chicago
global_registry_probe:
  class: ProbeJob
  every: 1.day
  at: "6:00"
  expires_after: 1.minute
"#,
    );
    let queue = Arc::new(InMemoryQueue::new());
    let now = chicago("2016-12-01 05:00", "CST");
    SchedulerJob::load(queue.clone(), Some(path.as_path()))
        .unwrap()
        .run_pass_at(now)
        .await
        .unwrap();

    let mut handlers = HandlerRegistry::new();
    handlers.register("ProbeJob", Arc::new(RecordingJob::new()));
    let worker = Worker::new(queue, FutureJob::new(Arc::new(handlers)));
    worker.tick_at(now + Duration::hours(2)).await.unwrap();

    let reports: Vec<_> = observer
        .reports()
        .into_iter()
        .filter(|r| r.task_name.as_str() == "global_registry_probe")
        .collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].scheduled_time.to_utc(),
        chicago("2016-12-01 06:00", "CST")
    );
}
