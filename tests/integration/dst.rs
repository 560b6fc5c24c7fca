//! Daylight saving integration tests.
//!
//! Tests that run scheduling passes across the America/Chicago transitions
//! of 2016: clocks fell back from 02:00 CDT to 01:00 CST on November 6 and
//! sprang forward from 02:00 CST to 03:00 CDT on March 13.

use crate::common::{chicago, queued_times, write_config};
use chrono::{DateTime, Utc};
use foresight::{InMemoryQueue, SchedulerJob};
use std::sync::Arc;

const DST_TASKS: &str = r#"
tz: America/Chicago
nightly_at_half_past_one:
  class: NightlyJob
  every: 1.day
  at: "01:30"
nightly_at_half_past_two:
  class: NightlyJob
  every: 1.day
  at: "02:30"
hourly_at_half_past:
  class: HourlyJob
  every: 1.hour
  at: "*:30"
"#;

async fn pass(now: DateTime<Utc>) -> (tempfile::TempDir, SchedulerJob<InMemoryQueue>) {
    let (dir, path) = write_config(DST_TASKS);
    let scheduler =
        SchedulerJob::load(Arc::new(InMemoryQueue::new()), Some(path.as_path())).unwrap();
    scheduler.run_pass_at(now).await.unwrap();
    (dir, scheduler)
}

/// Test: A daily run inside the repeated hour happens once, at the first
/// occurrence, and the next day is back on standard time.
#[tokio::test]
async fn test_fall_back_daily_runs_once() {
    let now = chicago("2016-11-06 00:00", "CDT");
    let (_dir, scheduler) = pass(now).await;

    assert_eq!(
        queued_times(scheduler.queue().as_ref(), "nightly_at_half_past_one").await,
        vec![
            chicago("2016-11-06 01:30", "CDT"),
            chicago("2016-11-07 01:30", "CST"),
        ]
    );

    let again = scheduler.run_pass_at(now).await.unwrap();
    assert!(again.submitted.is_empty());
}

/// Test: An hourly run with no fixed hour fires in both copies of the
/// repeated hour.
#[tokio::test]
async fn test_fall_back_hourly_runs_in_both_copies() {
    let now = chicago("2016-11-06 00:00", "CDT");
    let (_dir, scheduler) = pass(now).await;

    assert_eq!(
        queued_times(scheduler.queue().as_ref(), "hourly_at_half_past").await,
        vec![
            chicago("2016-11-06 00:30", "CDT"),
            chicago("2016-11-06 01:30", "CDT"),
            chicago("2016-11-06 01:30", "CST"),
            chicago("2016-11-06 02:30", "CST"),
            chicago("2016-11-06 03:30", "CST"),
            chicago("2016-11-06 04:30", "CST"),
            chicago("2016-11-06 05:30", "CST"),
        ]
    );
}

/// Test: A pass made during the repeated hour continues from what is
/// queued without filling in the hour again.
#[tokio::test]
async fn test_fall_back_pass_inside_repeated_hour_continues() {
    let (_dir, scheduler) = pass(chicago("2016-11-06 00:00", "CDT")).await;

    let report = scheduler
        .run_pass_at(chicago("2016-11-06 01:00", "CST"))
        .await
        .unwrap();

    let added: Vec<_> = report
        .submitted_for("hourly_at_half_past")
        .map(|s| s.run_at.to_utc())
        .collect();
    assert_eq!(
        added,
        vec![
            chicago("2016-11-06 06:30", "CST"),
            chicago("2016-11-06 07:30", "CST"),
        ]
    );
    assert_eq!(report.submitted_for("nightly_at_half_past_one").count(), 0);
}

/// Test: A daily run in the skipped hour moves forward an hour, and the next
/// day is back at the configured time.
#[tokio::test]
async fn test_spring_forward_daily_shifts_an_hour() {
    let now = chicago("2016-03-13 01:00", "CST");
    let (_dir, scheduler) = pass(now).await;

    assert_eq!(
        queued_times(scheduler.queue().as_ref(), "nightly_at_half_past_two").await,
        vec![
            chicago("2016-03-13 03:30", "CDT"),
            chicago("2016-03-14 02:30", "CDT"),
        ]
    );

    let again = scheduler.run_pass_at(now).await.unwrap();
    assert!(again.submitted.is_empty());
}

/// Test: An hourly run with no fixed hour skips the missing hour.
#[tokio::test]
async fn test_spring_forward_hourly_skips_missing_hour() {
    let (_dir, scheduler) = pass(chicago("2016-03-13 00:50", "CST")).await;

    assert_eq!(
        queued_times(scheduler.queue().as_ref(), "hourly_at_half_past").await,
        vec![
            chicago("2016-03-13 01:30", "CST"),
            chicago("2016-03-13 03:30", "CDT"),
            chicago("2016-03-13 04:30", "CDT"),
            chicago("2016-03-13 05:30", "CDT"),
            chicago("2016-03-13 06:30", "CDT"),
            chicago("2016-03-13 07:30", "CDT"),
            chicago("2016-03-13 08:30", "CDT"),
        ]
    );
}

/// Test: A first pass made during the second copy of the repeated hour
/// starts within the hour instead of going back to the first copy.
#[tokio::test]
async fn test_fall_back_first_pass_inside_second_copy() {
    let (_dir, path) = write_config(
        r#"
tz: America/Chicago
hourly_at_ten_to:
  class: HourlyJob
  every: 1.hour
  at: "*:50"
"#,
    );
    let scheduler =
        SchedulerJob::load(Arc::new(InMemoryQueue::new()), Some(path.as_path())).unwrap();
    let now = chicago("2016-11-06 01:45", "CST");

    scheduler.run_pass_at(now).await.unwrap();

    let times = queued_times(scheduler.queue().as_ref(), "hourly_at_ten_to").await;
    assert_eq!(times[0], chicago("2016-11-06 01:50", "CST"));
    assert_eq!(times[1], chicago("2016-11-06 02:50", "CST"));
    assert_eq!(times.len(), 7);
}
