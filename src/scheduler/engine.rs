//! Scheduling pass.
//!
//! One pass builds every configured task, asks the job queue which runs are
//! already waiting for it, generates the run times still needed to fill the
//! task's lookahead window, and submits one envelope per new run time.
//!
//! - A task that cannot be built is logged with its error kind and skipped.
//! - A failing queue read or write aborts the whole pass, since every later
//!   dedup decision depends on the queue state.
//! - Running the pass twice in a row submits nothing the second time.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

use super::envelope::{Envelope, existing_run_times};
use super::types::{PassReport, SchedulerError, SkippedTask, Submission};
use crate::config::{SchedulerConfig, TaskConfigBuilder, YamlLoader};
use crate::core::job::HandlerRegistry;
use crate::core::schedule::ScheduleSpec;
use crate::queue::JobQueue;

/// Keeps the job queue filled with upcoming runs of every configured task.
pub struct SchedulerJob<Q: JobQueue + ?Sized> {
    queue: Arc<Q>,
    config: SchedulerConfig,
    handlers: Option<Arc<HandlerRegistry>>,
}

impl<Q: JobQueue + ?Sized> SchedulerJob<Q> {
    /// Create a scheduler for an already loaded config.
    pub fn new(queue: Arc<Q>, config: SchedulerConfig) -> Self {
        Self {
            queue,
            config,
            handlers: None,
        }
    }

    /// Load the config from `path`, or from the env var / default location.
    pub fn load(queue: Arc<Q>, path: Option<&Path>) -> Result<Self, SchedulerError> {
        let path = YamlLoader::resolve_path(path);
        tracing::debug!(path = %path.display(), "Loading scheduler config");
        let config = YamlLoader::load(&path)?;
        Ok(Self::new(queue, config))
    }

    /// Reject tasks whose class has no handler in `handlers`.
    pub fn with_handlers(mut self, handlers: Arc<HandlerRegistry>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Run one pass now.
    pub async fn run_pass(&self) -> Result<PassReport, SchedulerError> {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass as if the current time were `now`.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassReport, SchedulerError> {
        let mut builder = TaskConfigBuilder::new(&self.config);
        if let Some(handlers) = &self.handlers {
            builder = builder.with_registry(handlers);
        }

        let mut report = PassReport::default();
        for (task, built) in builder.build_all(&self.config) {
            match built {
                Ok(spec) => {
                    let submitted = self.schedule_at(&spec, now).await?;
                    report.submitted.extend(submitted);
                }
                Err(e) => {
                    tracing::warn!(task = %task, kind = e.kind(), error = %e, "Skipping task");
                    report.skipped.push(SkippedTask {
                        task,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            submitted = report.submitted.len(),
            skipped = report.skipped.len(),
            "Scheduling pass finished"
        );
        Ok(report)
    }

    /// Submit the runs `spec` still needs at `now`.
    pub async fn schedule_at(
        &self,
        spec: &ScheduleSpec,
        now: DateTime<Utc>,
    ) -> Result<Vec<Submission>, SchedulerError> {
        let existing = existing_run_times(self.queue.as_ref(), spec).await?;
        let new_times = spec.future_run_times_at(&existing, now);

        tracing::debug!(
            task = %spec.name(),
            existing = existing.len(),
            new = new_times.len(),
            "Computed future run times"
        );

        let mut submitted = Vec::with_capacity(new_times.len());
        for run_at in new_times {
            let entry = Envelope::new(spec.clone(), run_at).to_entry()?;
            let entry_id = self
                .queue
                .enqueue_at(run_at.with_timezone(&Utc), entry)
                .await?;
            tracing::info!(task = %spec.name(), class = %spec.class(), run_at = %run_at, entry = %entry_id, "Queued run");
            submitted.push(Submission {
                task: spec.name().clone(),
                run_at,
                entry_id,
            });
        }
        Ok(submitted)
    }
}
