//! Job queue abstraction.
//!
//! The scheduler never runs jobs itself: it submits delayed entries to a job
//! queue and reads back what is already scheduled. This module provides the
//! trait for that queue with pluggable backends (in-memory, SQLite).

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryQueue;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::types::{EntryId, JobClass};

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue could not be reached or the operation failed in its backend.
    #[error("job queue unavailable: {0}")]
    Unavailable(String),

    /// The requested entry was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Queue lock was poisoned.
    #[error("queue lock poisoned")]
    LockPoisoned,
}

/// An entry to be enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    /// Handler class the queue will run.
    pub class: JobClass,
    /// Queue lane.
    pub queue: String,
    /// Handler payload.
    pub payload: Value,
}

impl NewEntry {
    pub fn new(class: impl Into<JobClass>, queue: impl Into<String>, payload: Value) -> Self {
        Self {
            class: class.into(),
            queue: queue.into(),
            payload,
        }
    }
}

/// An entry waiting in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub id: EntryId,
    /// When the queue will hand the entry to a worker.
    pub run_at: DateTime<Utc>,
    pub class: JobClass,
    pub queue: String,
    pub payload: Value,
}

/// A queue of delayed jobs.
///
/// Implementations must be thread-safe and handle concurrent access.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add an entry to run at `run_at`.
    async fn enqueue_at(&self, run_at: DateTime<Utc>, entry: NewEntry)
    -> Result<EntryId, QueueError>;

    /// All waiting entries, ordered by `run_at`.
    async fn scheduled(&self) -> Result<Vec<ScheduledEntry>, QueueError>;

    /// Remove one entry.
    async fn delete(&self, id: &EntryId) -> Result<(), QueueError>;

    /// Remove and return every entry with `run_at <= now`, ordered by `run_at`.
    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>, QueueError>;
}
