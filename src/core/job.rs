//! Job handler trait and the handler registry.
//!
//! A task's `class` names a handler registered here. Handlers either take
//! the task name and the originally scheduled time of the run, or nothing
//! at all; [`Job::takes_schedule`] decides which form they receive.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use super::types::{JobClass, TaskName};

/// Errors returned by job handlers.
#[derive(Debug, Error)]
pub enum JobError {
    /// The handler failed with a message.
    #[error("job failed: {0}")]
    Failed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Schedule information handed to jobs that accept it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledRun {
    pub task_name: TaskName,
    /// The time the run was planned for, not the time it actually started.
    pub scheduled_time: DateTime<Tz>,
    pub arguments: Vec<Value>,
}

/// What a job receives when it is performed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRun {
    /// Run of a scheduled task, for handlers that take the schedule.
    Scheduled(ScheduledRun),
    /// Run without schedule information.
    Bare { arguments: Vec<Value> },
}

impl JobRun {
    /// Shape `run` for `job`: handlers that do not take the schedule get a
    /// bare run carrying only the arguments.
    pub fn for_job(job: &dyn Job, run: ScheduledRun) -> Self {
        if job.takes_schedule() {
            JobRun::Scheduled(run)
        } else {
            JobRun::Bare {
                arguments: run.arguments,
            }
        }
    }

    pub fn arguments(&self) -> &[Value] {
        match self {
            JobRun::Scheduled(run) => &run.arguments,
            JobRun::Bare { arguments } => arguments,
        }
    }
}

/// A handler that can be scheduled.
///
/// # Example
///
/// ```ignore
/// use foresight::{Job, JobError, JobRun};
/// use async_trait::async_trait;
///
/// struct NightlyReport;
///
/// #[async_trait]
/// impl Job for NightlyReport {
///     async fn perform(&self, run: JobRun) -> Result<(), JobError> {
///         if let JobRun::Scheduled(run) = run {
///             println!("report for {}", run.scheduled_time);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync {
    /// Whether `perform` wants the task name and scheduled time.
    fn takes_schedule(&self) -> bool {
        true
    }

    async fn perform(&self, run: JobRun) -> Result<(), JobError>;
}

/// Adapts an async closure that ignores schedule information.
struct BareFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Job for BareFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send,
{
    fn takes_schedule(&self) -> bool {
        false
    }

    async fn perform(&self, run: JobRun) -> Result<(), JobError> {
        let arguments = match run {
            JobRun::Scheduled(run) => run.arguments,
            JobRun::Bare { arguments } => arguments,
        };
        (self.f)(arguments).await
    }
}

/// Adapts an async closure that takes the scheduled run.
struct ScheduledFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Job for ScheduledFn<F>
where
    F: Fn(ScheduledRun) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send,
{
    async fn perform(&self, run: JobRun) -> Result<(), JobError> {
        match run {
            JobRun::Scheduled(run) => (self.f)(run).await,
            JobRun::Bare { .. } => Err(JobError::Failed(
                "handler needs the scheduled time but got a bare run".into(),
            )),
        }
    }
}

/// Table of handlers by job class.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobClass, Arc<dyn Job>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `class`.
    pub fn register(&mut self, class: impl Into<JobClass>, job: Arc<dyn Job>) -> &mut Self {
        self.handlers.insert(class.into(), job);
        self
    }

    /// Register an async closure that only receives the task arguments.
    pub fn register_fn<F, Fut>(&mut self, class: impl Into<JobClass>, f: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.register(class, Arc::new(BareFn { f }))
    }

    /// Register an async closure that receives the task name and scheduled time.
    pub fn register_scheduled_fn<F, Fut>(&mut self, class: impl Into<JobClass>, f: F) -> &mut Self
    where
        F: Fn(ScheduledRun) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.register(class, Arc::new(ScheduledFn { f }))
    }

    pub fn get(&self, class: &JobClass) -> Option<Arc<dyn Job>> {
        self.handlers.get(class).cloned()
    }

    pub fn contains(&self, class: &JobClass) -> bool {
        self.handlers.contains_key(class)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<_> = self.handlers.keys().map(JobClass::as_str).collect();
        classes.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("classes", &classes)
            .finish()
    }
}
