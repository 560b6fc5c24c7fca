//! foresight - keeps a job queue filled with the upcoming runs of recurring
//! tasks, and skips runs that start too late.
//!
//! Tasks are declared in YAML (`every: 1.hour`, `at: "*:30"`,
//! `at: "Fri 23:45"`, `expires_after: 30.minutes`, `tz: America/Chicago`).
//! A scheduling pass computes the run times each task still needs, matching
//! what is already queued so nothing is submitted twice, and daylight
//! saving changes are handled in the task's own timezone.

pub mod config;
pub mod core;
pub mod events;
pub mod queue;
pub mod scheduler;
pub mod testing;

pub use config::{ConfigError, SchedulerConfig, TaskConfig, TaskConfigBuilder, YamlLoader};
pub use core::at::TimeSpec;
pub use core::frequency::{Frequency, FrequencyUnit};
pub use core::job::{HandlerRegistry, Job, JobError, JobRun, ScheduledRun};
pub use core::schedule::{ScheduleError, ScheduleSpec, ScheduleSpecBuilder, TaskParams};
pub use core::types::{EntryId, JobClass, TaskName};
pub use events::{ExpiredRun, ExpiryObserver, ObserverError, ObserverRegistry};
pub use queue::{InMemoryQueue, JobQueue, NewEntry, QueueError, ScheduledEntry};
#[cfg(feature = "sqlite")]
pub use queue::SqliteQueue;
pub use scheduler::{
    Envelope, FUTURE_JOB_CLASS, FutureJob, Outcome, PassReport, SchedulerError, SchedulerJob,
    Worker, delete_all_scheduled, existing_run_times,
};
