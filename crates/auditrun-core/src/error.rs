//! Core domain errors.

use thiserror::Error;

/// Core domain errors for AuditRun.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No task with the given name is known to the run.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A descriptor with the same name was already registered.
    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),
}
