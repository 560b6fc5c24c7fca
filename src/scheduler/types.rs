//! Scheduler type definitions.
//!
//! This module contains the error type, pass report and run outcome types.

use chrono::DateTime;
use chrono_tz::Tz;
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::job::JobError;
use crate::core::types::{EntryId, TaskName};
use crate::events::ExpiredRun;
use crate::queue::QueueError;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Reading or writing the job queue failed. Aborts a scheduling pass.
    #[error("job queue unavailable: {0}")]
    JobQueueUnavailable(#[from] QueueError),

    /// The config file could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A queued payload is not a scheduler envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// No handler is registered for the job class.
    #[error("no handler registered for job class: {0}")]
    UnknownJob(String),

    /// The handler ran and failed.
    #[error("task '{task}' failed: {source}")]
    JobFailed {
        task: TaskName,
        #[source]
        source: JobError,
    },
}

/// One entry submitted to the job queue during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub task: TaskName,
    pub run_at: DateTime<Tz>,
    pub entry_id: EntryId,
}

/// A task left out of a pass because it could not be built.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTask {
    pub task: TaskName,
    /// Error kind, e.g. `InvalidTimeSpec` or `MissingRequiredField`.
    pub kind: &'static str,
    pub error: String,
}

/// What a scheduling pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub submitted: Vec<Submission>,
    pub skipped: Vec<SkippedTask>,
}

impl PassReport {
    /// Submissions made for one task.
    pub fn submitted_for<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a Submission> + 'a {
        self.submitted.iter().filter(move |s| s.task.as_str() == task)
    }
}

/// Final state of one queued run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The handler ran.
    Executed,
    /// The run started too late and was skipped.
    Expired(ExpiredRun),
}
