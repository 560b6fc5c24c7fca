//! Testing utilities for users of the foresight library.
//!
//! This module provides helpers for testing scheduled jobs:
//!
//! - [`RecordingJob`]: A job that records every run it receives
//! - [`FailingQueue`]: A job queue whose reads and writes can be made to fail
//! - [`RecordingObserver`]: An expiry observer that collects reports
//! - [`TestHarness`]: Scheduler, worker and in-memory queue wired together

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{ConfigError, YamlLoader};
use crate::core::job::{HandlerRegistry, Job, JobError, JobRun};
use crate::core::types::EntryId;
use crate::events::{ExpiredRun, ExpiryObserver, ObserverError, ObserverRegistry};
use crate::queue::{InMemoryQueue, JobQueue, NewEntry, QueueError, ScheduledEntry};
use crate::scheduler::{FutureJob, Handled, PassReport, SchedulerError, SchedulerJob, Worker};

/// A job that records the runs it is given.
///
/// # Example
///
/// ```
/// use foresight::testing::RecordingJob;
///
/// // Fails twice, then succeeds
/// let job = RecordingJob::new().failing(2);
/// assert_eq!(job.runs().len(), 0);
/// ```
pub struct RecordingJob {
    takes_schedule: bool,
    runs: Mutex<Vec<JobRun>>,
    failures_remaining: AtomicU32,
}

impl RecordingJob {
    /// A job that takes the schedule and always succeeds.
    pub fn new() -> Self {
        Self {
            takes_schedule: true,
            runs: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// A job that wants no schedule information.
    pub fn bare() -> Self {
        Self {
            takes_schedule: false,
            ..Self::new()
        }
    }

    /// Fail the first `times` runs.
    pub fn failing(self, times: u32) -> Self {
        self.failures_remaining.store(times, Ordering::SeqCst);
        self
    }

    /// Every run received so far, including failed ones.
    pub fn runs(&self) -> Vec<JobRun> {
        self.runs
            .lock()
            .map(|runs| runs.clone())
            .unwrap_or_default()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().map(|runs| runs.len()).unwrap_or(0)
    }
}

impl Default for RecordingJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Job for RecordingJob {
    fn takes_schedule(&self) -> bool {
        self.takes_schedule
    }

    async fn perform(&self, run: JobRun) -> Result<(), JobError> {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(run);
        }

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(JobError::Failed("intentional test failure".into()));
        }
        Ok(())
    }
}

/// A job queue that can be told to fail.
///
/// Delegates to an [`InMemoryQueue`] while healthy. [`FailingQueue::new`]
/// starts with both reads and writes failing.
pub struct FailingQueue {
    inner: InMemoryQueue,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingQueue {
    /// A queue where every operation fails.
    pub fn new() -> Self {
        Self {
            inner: InMemoryQueue::new(),
            fail_reads: AtomicBool::new(true),
            fail_writes: AtomicBool::new(true),
        }
    }

    /// A queue that works until told otherwise.
    pub fn healthy() -> Self {
        let queue = Self::new();
        queue.set_fail_reads(false);
        queue.set_fail_writes(false);
        queue
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> Result<(), QueueError> {
        if flag.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable(format!(
                "injected {} failure",
                operation
            )));
        }
        Ok(())
    }
}

impl Default for FailingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for FailingQueue {
    async fn enqueue_at(
        &self,
        run_at: DateTime<Utc>,
        entry: NewEntry,
    ) -> Result<EntryId, QueueError> {
        self.check(&self.fail_writes, "enqueue")?;
        self.inner.enqueue_at(run_at, entry).await
    }

    async fn scheduled(&self) -> Result<Vec<ScheduledEntry>, QueueError> {
        self.check(&self.fail_reads, "read")?;
        self.inner.scheduled().await
    }

    async fn delete(&self, id: &EntryId) -> Result<(), QueueError> {
        self.check(&self.fail_writes, "delete")?;
        self.inner.delete(id).await
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>, QueueError> {
        self.check(&self.fail_reads, "take")?;
        self.inner.take_due(now).await
    }
}

/// An expiry observer that keeps every report it receives.
#[derive(Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<ExpiredRun>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ExpiredRun> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl ExpiryObserver for RecordingObserver {
    fn on_expired(&self, run: &ExpiredRun) -> Result<(), ObserverError> {
        self.reports
            .lock()
            .map_err(|_| ObserverError("recording lock poisoned".into()))?
            .push(run.clone());
        Ok(())
    }
}

/// Scheduler, worker, in-memory queue and a private observer registry wired
/// together, driven by an explicit clock.
///
/// # Example
///
/// ```ignore
/// use foresight::testing::{RecordingJob, TestHarness};
/// use std::sync::Arc;
///
/// let job = Arc::new(RecordingJob::new());
/// let harness = TestHarness::from_yaml(yaml)?.with_job("ReportJob", job.clone());
///
/// harness.run_pass_at(now).await?;
/// harness.tick_at(now).await?;
/// assert_eq!(job.run_count(), 1);
/// ```
pub struct TestHarness {
    queue: Arc<InMemoryQueue>,
    yaml: String,
    handlers: HandlerRegistry,
    observer: Arc<RecordingObserver>,
}

impl TestHarness {
    /// Harness for the tasks in `yaml`.
    pub fn from_yaml(yaml: impl Into<String>) -> Result<Self, ConfigError> {
        let yaml = yaml.into();
        YamlLoader::parse(&yaml)?;
        Ok(Self {
            queue: Arc::new(InMemoryQueue::new()),
            yaml,
            handlers: HandlerRegistry::new(),
            observer: Arc::new(RecordingObserver::new()),
        })
    }

    /// Register a handler.
    pub fn with_job(mut self, class: &str, job: Arc<dyn Job>) -> Self {
        self.handlers.register(class, job);
        self
    }

    pub fn queue(&self) -> &Arc<InMemoryQueue> {
        &self.queue
    }

    /// Expiry reports seen so far.
    pub fn expired(&self) -> Vec<ExpiredRun> {
        self.observer.reports()
    }

    /// Run a scheduling pass at `now`.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassReport, SchedulerError> {
        let config = YamlLoader::parse(&self.yaml)?;
        SchedulerJob::new(self.queue.clone(), config)
            .run_pass_at(now)
            .await
    }

    /// Run every entry due at `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<Vec<Handled>, QueueError> {
        let observers = Arc::new(ObserverRegistry::new());
        observers.register(self.observer.clone());
        let future_job = FutureJob::with_observers(Arc::new(self.handlers.clone()), observers);
        Worker::new(self.queue.clone(), future_job).tick_at(now).await
    }
}
