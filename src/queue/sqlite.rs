//! SQLite job queue.
//!
//! Persists delayed entries in a single `job_queue` table. Run times are
//! stored as whole epoch seconds and payloads as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use super::{JobQueue, NewEntry, QueueError, ScheduledEntry};
use crate::core::types::{EntryId, JobClass};

type EntryRow = (String, i64, String, String, String);

/// SQLite queue backend.
///
/// Provides persistent storage with automatic schema migration.
pub struct SqliteQueue {
    pool: SqlitePool,
}

impl SqliteQueue {
    /// Open (or create) the queue database at `path` and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(unavailable)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let queue = Self { pool };
        queue.run_migrations().await?;
        Ok(queue)
    }

    /// Create an in-memory SQLite queue (useful for testing).
    pub async fn in_memory() -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(unavailable)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let queue = Self { pool };
        queue.run_migrations().await?;
        Ok(queue)
    }

    async fn run_migrations(&self) -> Result<(), QueueError> {
        let schema = include_str!("../../migrations/001_job_queue.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Unavailable(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn unavailable(e: sqlx::Error) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

fn row_to_entry(row: EntryRow) -> Result<ScheduledEntry, QueueError> {
    let (id, run_at, class, queue, payload) = row;
    let id = Uuid::parse_str(&id)
        .map_err(|e| QueueError::Serialization(format!("entry id '{}': {}", id, e)))?;
    let run_at = DateTime::from_timestamp(run_at, 0)
        .ok_or_else(|| QueueError::Serialization(format!("run_at out of range: {}", run_at)))?;
    let payload =
        serde_json::from_str(&payload).map_err(|e| QueueError::Serialization(e.to_string()))?;

    Ok(ScheduledEntry {
        id: EntryId::from_uuid(id),
        run_at,
        class: JobClass::new(class),
        queue,
        payload,
    })
}

#[async_trait]
impl JobQueue for SqliteQueue {
    async fn enqueue_at(
        &self,
        run_at: DateTime<Utc>,
        entry: NewEntry,
    ) -> Result<EntryId, QueueError> {
        let id = EntryId::new();
        let payload = serde_json::to_string(&entry.payload)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO job_queue (id, run_at, class, queue, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(run_at.timestamp())
        .bind(entry.class.as_str())
        .bind(&entry.queue)
        .bind(payload)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(id)
    }

    async fn scheduled(&self) -> Result<Vec<ScheduledEntry>, QueueError> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, run_at, class, queue, payload FROM job_queue ORDER BY run_at, created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(row_to_entry).collect()
    }

    async fn delete(&self, id: &EntryId) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM job_queue WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(format!("entry: {}", id)));
        }
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>, QueueError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, run_at, class, queue, payload FROM job_queue WHERE run_at <= ? ORDER BY run_at, created_at",
        )
        .bind(now.timestamp())
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        sqlx::query("DELETE FROM job_queue WHERE run_at <= ?")
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        rows.into_iter().map(row_to_entry).collect()
    }
}
