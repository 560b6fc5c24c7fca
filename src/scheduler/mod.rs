//! Scheduling pass, expiration guard and queue worker.
//!
//! [`SchedulerJob`] keeps the job queue filled with upcoming runs,
//! [`FutureJob`] decides at run time whether a run is still fresh enough to
//! execute, and [`Worker`] drains due entries from a queue into them.

mod engine;
mod envelope;
mod future_job;
mod types;
mod worker;

pub use engine::SchedulerJob;
pub use envelope::{
    Envelope, FUTURE_JOB_CLASS, delete_all_scheduled, existing_run_times, is_future_job,
};
pub use future_job::FutureJob;
pub use types::{Outcome, PassReport, SchedulerError, SkippedTask, Submission};
pub use worker::{Handled, Worker};
