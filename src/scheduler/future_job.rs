//! Expiration guard for queued runs.
//!
//! The queue hands each scheduler entry to [`FutureJob`] when it comes due.
//! If the task has an `expires_after` window and the run is past
//! `scheduled_time + expires_after`, the real job is not called and an
//! [`ExpiredRun`] report goes to the observers. Otherwise the job's handler
//! runs, with the task name and scheduled time if it takes them.
//!
//! Expired runs are final: nothing is re-queued.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::envelope::Envelope;
use super::types::{Outcome, SchedulerError};
use crate::core::job::{HandlerRegistry, JobRun, ScheduledRun};
use crate::events::{ExpiredRun, ObserverRegistry};
use crate::queue::ScheduledEntry;

/// Runs or expires scheduled runs.
#[derive(Debug, Clone)]
pub struct FutureJob {
    handlers: Arc<HandlerRegistry>,
    observers: Arc<ObserverRegistry>,
}

impl FutureJob {
    /// Report expired runs to the process-wide observer registry.
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self::with_observers(handlers, ObserverRegistry::global())
    }

    pub fn with_observers(handlers: Arc<HandlerRegistry>, observers: Arc<ObserverRegistry>) -> Self {
        Self {
            handlers,
            observers,
        }
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Handle `envelope` now.
    pub async fn perform(&self, envelope: &Envelope) -> Result<Outcome, SchedulerError> {
        self.perform_at(envelope, Utc::now()).await
    }

    /// Decode a queue entry and handle it at `now`.
    pub async fn perform_entry(
        &self,
        entry: &ScheduledEntry,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SchedulerError> {
        let envelope = Envelope::from_entry(entry)?;
        self.perform_at(&envelope, now).await
    }

    /// Handle `envelope` as if it were picked up at `now`.
    pub async fn perform_at(
        &self,
        envelope: &Envelope,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SchedulerError> {
        let task = &envelope.task;

        if task.is_expired(&envelope.scheduled_time, now) {
            let expired = ExpiredRun {
                task_name: task.name().clone(),
                class: task.class().clone(),
                scheduled_time: envelope.scheduled_time,
                run_time: now,
            };
            tracing::warn!(
                task = %task.name(),
                class = %task.class(),
                scheduled_time = %envelope.scheduled_time,
                run_time = %now,
                late_minutes = expired.lateness().num_minutes(),
                "Run expired, skipping"
            );
            self.observers.notify(&expired);
            return Ok(Outcome::Expired(expired));
        }

        let job = self
            .handlers
            .get(task.class())
            .ok_or_else(|| SchedulerError::UnknownJob(task.class().to_string()))?;

        let run = JobRun::for_job(
            job.as_ref(),
            ScheduledRun {
                task_name: task.name().clone(),
                scheduled_time: envelope.scheduled_time,
                arguments: task.arguments().to_vec(),
            },
        );

        tracing::info!(task = %task.name(), class = %task.class(), scheduled_time = %envelope.scheduled_time, "Running scheduled job");
        job.perform(run)
            .await
            .map_err(|source| SchedulerError::JobFailed {
                task: task.name().clone(),
                source,
            })?;

        Ok(Outcome::Executed)
    }
}
