use std::any::Any;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// The reason a task did not produce a value
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The task body panicked. Holds the panic message when it was a string.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// A fallible task or [crate::command::Command] returned an error.
    #[error("task returned an error: {0:#}")]
    Error(anyhow::Error),
}

impl TaskFailure {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> TaskFailure {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        TaskFailure::Panicked(message)
    }
}

/// Errors reported by the thread pool and by task handles
#[derive(Debug, Error)]
pub enum PoolError {
    /// Submission after shutdown was initiated
    #[error("the {pool} pool is closed")]
    Closed { pool: String },
    /// The task ran and failed
    #[error("task failed: {0}")]
    TaskFailed(#[source] TaskFailure),
    /// The task was discarded before it ran, see [crate::shutdown_mode::ShutdownMode::Immediate]
    #[error("task was cancelled before it ran")]
    Cancelled,
    /// The outcome was already returned by an earlier call on the same handle
    #[error("the outcome of the task was already taken")]
    Consumed,
    /// The task did not complete within the given time. The task is still running.
    #[error("task did not complete within {0:?}")]
    Timeout(Duration),
    #[error("a thread pool needs at least one thread")]
    InvalidThreadCount,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
    /// Worker threads that did not exit cleanly
    #[error("errors occurred while joining threads in the {pool} pool: {}", errors.join(", "))]
    Join { pool: String, errors: Vec<String> },
}

impl PoolError {
    /// The failure of the task if this error was caused by one
    pub fn task_failure(&self) -> Option<&TaskFailure> {
        match self {
            PoolError::TaskFailed(failure) => Some(failure),
            _ => None,
        }
    }
}
