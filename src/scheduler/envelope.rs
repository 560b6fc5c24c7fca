//! Queue payload for scheduled runs.
//!
//! Every run the scheduler submits is queued under the marker class
//! [`FUTURE_JOB_CLASS`] with a JSON payload holding the full task record and
//! the time the run was scheduled for:
//!
//! ```json
//! {"task": {"name": "nightly", "class": "ReportJob", "every": "1.day", ...},
//!  "scheduled_time": 1480658400}
//! ```
//!
//! The marker lets the scheduler find its own entries among everything else
//! in the queue, and the embedded task record lets the expiration check run
//! without the config file.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::SchedulerError;
use crate::core::schedule::ScheduleSpec;
use crate::queue::{JobQueue, NewEntry, QueueError, ScheduledEntry};

/// Class name of every entry the scheduler submits.
pub const FUTURE_JOB_CLASS: &str = "foresight::FutureJob";

/// One scheduled run of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub task: ScheduleSpec,
    pub scheduled_time: DateTime<Tz>,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    task: ScheduleSpec,
    scheduled_time: i64,
}

impl Envelope {
    pub fn new(task: ScheduleSpec, scheduled_time: DateTime<Tz>) -> Self {
        Self {
            task,
            scheduled_time,
        }
    }

    /// Encode as a queue payload.
    pub fn to_payload(&self) -> Result<Value, SchedulerError> {
        serde_json::to_value(Wire {
            task: self.task.clone(),
            scheduled_time: self.scheduled_time.timestamp(),
        })
        .map_err(|e| SchedulerError::InvalidEnvelope(e.to_string()))
    }

    /// Decode a queue payload.
    pub fn from_payload(payload: &Value) -> Result<Self, SchedulerError> {
        let wire = Wire::deserialize(payload)
            .map_err(|e| SchedulerError::InvalidEnvelope(e.to_string()))?;
        let scheduled_time = DateTime::<Utc>::from_timestamp(wire.scheduled_time, 0)
            .ok_or_else(|| {
                SchedulerError::InvalidEnvelope(format!(
                    "scheduled_time out of range: {}",
                    wire.scheduled_time
                ))
            })?
            .with_timezone(&wire.task.timezone());

        Ok(Self {
            task: wire.task,
            scheduled_time,
        })
    }

    /// The queue entry for this run, in the task's queue lane.
    pub fn to_entry(&self) -> Result<NewEntry, SchedulerError> {
        Ok(NewEntry::new(
            FUTURE_JOB_CLASS,
            self.task.queue_name(),
            self.to_payload()?,
        ))
    }

    /// Decode a queued entry; fails for entries the scheduler did not submit.
    pub fn from_entry(entry: &ScheduledEntry) -> Result<Self, SchedulerError> {
        if !is_future_job(entry) {
            return Err(SchedulerError::InvalidEnvelope(format!(
                "entry {} has class '{}', not {}",
                entry.id, entry.class, FUTURE_JOB_CLASS
            )));
        }
        Self::from_payload(&entry.payload)
    }
}

/// Whether `entry` was submitted by the scheduler.
pub fn is_future_job(entry: &ScheduledEntry) -> bool {
    entry.class.as_str() == FUTURE_JOB_CLASS
}

fn belongs_to(entry: &ScheduledEntry, spec: &ScheduleSpec) -> bool {
    let field = |name: &str| {
        entry
            .payload
            .pointer(&format!("/task/{}", name))
            .and_then(Value::as_str)
    };
    is_future_job(entry)
        && field("class") == Some(spec.class().as_str())
        && field("name") == Some(spec.name().as_str())
}

/// Run times already queued for `spec`, matched on class and task name,
/// in ascending order and in the task's timezone.
pub async fn existing_run_times<Q>(queue: &Q, spec: &ScheduleSpec) -> Result<Vec<DateTime<Tz>>, QueueError>
where
    Q: JobQueue + ?Sized,
{
    let tz = spec.timezone();
    let mut times: Vec<_> = queue
        .scheduled()
        .await?
        .iter()
        .filter(|entry| belongs_to(entry, spec))
        .map(|entry| entry.run_at.with_timezone(&tz))
        .collect();
    times.sort();
    Ok(times)
}

/// Delete every entry the scheduler submitted and return how many went.
/// Entries of other classes stay.
pub async fn delete_all_scheduled<Q>(queue: &Q) -> Result<usize, QueueError>
where
    Q: JobQueue + ?Sized,
{
    let mut deleted = 0;
    for entry in queue.scheduled().await? {
        if is_future_job(&entry) {
            queue.delete(&entry.id).await?;
            deleted += 1;
        }
    }
    tracing::info!(deleted, "Deleted scheduled runs");
    Ok(deleted)
}
