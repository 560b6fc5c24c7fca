//! In-memory job queue.
//!
//! Thread-safe queue for tests, dry runs and single-process embedding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{JobQueue, NewEntry, QueueError, ScheduledEntry};
use crate::core::types::EntryId;

/// In-memory queue backend.
///
/// Entries are kept ordered by run time. Nothing survives a restart.
pub struct InMemoryQueue {
    entries: RwLock<BTreeMap<(DateTime<Utc>, EntryId), ScheduledEntry>>,
}

impl InMemoryQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue_at(
        &self,
        run_at: DateTime<Utc>,
        entry: NewEntry,
    ) -> Result<EntryId, QueueError> {
        let mut entries = self.entries.write().map_err(|_| QueueError::LockPoisoned)?;
        let id = EntryId::new();
        entries.insert(
            (run_at, id),
            ScheduledEntry {
                id,
                run_at,
                class: entry.class,
                queue: entry.queue,
                payload: entry.payload,
            },
        );
        Ok(id)
    }

    async fn scheduled(&self) -> Result<Vec<ScheduledEntry>, QueueError> {
        let entries = self.entries.read().map_err(|_| QueueError::LockPoisoned)?;
        Ok(entries.values().cloned().collect())
    }

    async fn delete(&self, id: &EntryId) -> Result<(), QueueError> {
        let mut entries = self.entries.write().map_err(|_| QueueError::LockPoisoned)?;
        let key = entries
            .keys()
            .find(|(_, entry_id)| entry_id == id)
            .copied()
            .ok_or_else(|| QueueError::NotFound(format!("entry: {}", id)))?;
        entries.remove(&key);
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>, QueueError> {
        let mut entries = self.entries.write().map_err(|_| QueueError::LockPoisoned)?;
        let due: Vec<_> = entries
            .keys()
            .take_while(|(run_at, _)| *run_at <= now)
            .copied()
            .collect();
        Ok(due.iter().filter_map(|key| entries.remove(key)).collect())
    }
}
