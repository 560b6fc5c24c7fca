//! Queue worker.
//!
//! Takes due entries off the job queue and runs them: scheduler entries go
//! through [`FutureJob`], any other class is looked up in the handler
//! registry and run without schedule information. Each entry is handled on
//! its own; one failing does not stop the rest. There are no retries.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::envelope::is_future_job;
use super::future_job::FutureJob;
use super::types::{Outcome, SchedulerError};
use crate::core::job::JobRun;
use crate::core::types::EntryId;
use crate::queue::{JobQueue, QueueError, ScheduledEntry};

/// Result of handling one due entry.
#[derive(Debug)]
pub struct Handled {
    pub entry_id: EntryId,
    pub result: Result<Outcome, SchedulerError>,
}

/// Polls a job queue and runs whatever is due.
pub struct Worker<Q: JobQueue + ?Sized> {
    queue: Arc<Q>,
    future_job: FutureJob,
}

impl<Q: JobQueue + ?Sized> Worker<Q> {
    pub fn new(queue: Arc<Q>, future_job: FutureJob) -> Self {
        Self { queue, future_job }
    }

    /// Take and run every entry due at `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<Vec<Handled>, QueueError> {
        let due = self.queue.take_due(now).await?;
        let mut handled = Vec::with_capacity(due.len());

        for entry in due {
            let result = self.handle(&entry, now).await;
            match &result {
                Ok(Outcome::Executed) => {
                    tracing::debug!(entry = %entry.id, class = %entry.class, "Entry done");
                }
                Ok(Outcome::Expired(run)) => {
                    tracing::debug!(entry = %entry.id, task = %run.task_name, "Entry expired");
                }
                Err(e) => {
                    tracing::error!(entry = %entry.id, class = %entry.class, error = %e, "Entry failed");
                }
            }
            handled.push(Handled {
                entry_id: entry.id,
                result,
            });
        }

        Ok(handled)
    }

    async fn handle(
        &self,
        entry: &ScheduledEntry,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SchedulerError> {
        if is_future_job(entry) {
            return self.future_job.perform_entry(entry, now).await;
        }

        let job = self
            .future_job
            .handlers()
            .get(&entry.class)
            .ok_or_else(|| SchedulerError::UnknownJob(entry.class.to_string()))?;

        let arguments = match &entry.payload {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };

        job.perform(JobRun::Bare { arguments })
            .await
            .map_err(|source| SchedulerError::JobFailed {
                task: entry.class.as_str().into(),
                source,
            })?;
        Ok(Outcome::Executed)
    }

    /// Tick every `interval` until `shutdown` turns true or its sender goes away.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(interval = ?interval, "Worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_at(Utc::now()).await {
                        tracing::error!(error = %e, "Failed to take due entries");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Worker stopped");
    }
}
