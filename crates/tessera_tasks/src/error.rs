//! # Task Error Types
//!
//! All errors that can occur while building graphs and running the scheduler.

use thiserror::Error;

/// Errors that can occur in the task graph and scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Prerequisite added to a task that already started.
    #[error("task {task} already launched, prerequisites can no longer be added")]
    AlreadyLaunched {
        /// Debug name of the task.
        task: String,
    },

    /// A task cannot wait on itself.
    #[error("task {task} cannot be its own prerequisite")]
    SelfDependency {
        /// Debug name of the task.
        task: String,
    },

    /// Task queued while the scheduler is not running.
    #[error("scheduler is not running")]
    NotRunning,

    /// Startup requested after shutdown.
    #[error("scheduler was shut down and cannot be restarted")]
    SchedulerStopped,

    /// Scheduler configuration rejected.
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),

    /// The OS refused to create a thread.
    #[error("failed to spawn thread {name}: {reason}")]
    ThreadSpawn {
        /// Thread name.
        name: String,
        /// OS error message.
        reason: String,
    },
}

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;
