//! Expired-run notification.
//!
//! When a queued run starts too long after its scheduled time it is not
//! executed. Instead an [`ExpiredRun`] report goes to every observer in the
//! process-wide [`ObserverRegistry`], in registration order, on the calling
//! thread. A failing or panicking observer is logged and the remaining
//! observers still run.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock, RwLock};
use thiserror::Error;

use crate::core::types::{JobClass, TaskName};

/// A run that was skipped because it started too late.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredRun {
    pub task_name: TaskName,
    pub class: JobClass,
    /// When the run was supposed to start.
    pub scheduled_time: DateTime<Tz>,
    /// When it actually got picked up.
    pub run_time: DateTime<Utc>,
}

impl ExpiredRun {
    /// How late the run was.
    pub fn lateness(&self) -> chrono::Duration {
        self.run_time - self.scheduled_time.with_timezone(&Utc)
    }
}

/// Error returned by an observer.
#[derive(Debug, Error)]
#[error("observer failed: {0}")]
pub struct ObserverError(pub String);

/// Receives expired-run reports.
pub trait ExpiryObserver: Send + Sync {
    fn on_expired(&self, run: &ExpiredRun) -> Result<(), ObserverError>;
}

impl<F> ExpiryObserver for F
where
    F: Fn(&ExpiredRun) + Send + Sync,
{
    fn on_expired(&self, run: &ExpiredRun) -> Result<(), ObserverError> {
        self(run);
        Ok(())
    }
}

/// Ordered list of expiry observers.
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn ExpiryObserver>>>,
}

impl ObserverRegistry {
    /// Create a registry with no observers.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide registry. Observers are registered at startup and
    /// stay until [`clear`](Self::clear) or process exit.
    pub fn global() -> Arc<ObserverRegistry> {
        static GLOBAL: OnceLock<Arc<ObserverRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ObserverRegistry::new()))
            .clone()
    }

    /// Register an observer; it runs after those registered before it.
    pub fn register(&self, observer: Arc<dyn ExpiryObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    /// Register a closure.
    pub fn register_fn<F>(&self, f: F)
    where
        F: Fn(&ExpiredRun) + Send + Sync + 'static,
    {
        self.register(Arc::new(f));
    }

    /// Remove every observer.
    pub fn clear(&self) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Get the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Deliver `run` to every observer. Returns how many handled it without
    /// error or panic.
    pub fn notify(&self, run: &ExpiredRun) -> usize {
        // Snapshot so observers may register others without deadlocking.
        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut delivered = 0;
        for (index, observer) in observers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_expired(run))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(task = %run.task_name, observer = index, error = %e, "Expiry observer failed");
                }
                Err(_) => {
                    tracing::error!(task = %run.task_name, observer = index, "Expiry observer panicked");
                }
            }
        }
        delivered
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observer_count())
            .finish()
    }
}
