//! # Runtime Error Types

use thiserror::Error;

use tessera_core::{EcsError, Entity};
use tessera_tasks::TaskError;

/// Errors surfaced by the frame runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TesseraError {
    /// Component storage or system bookkeeping failed.
    #[error("ecs error: {0}")]
    Ecs(#[from] EcsError),

    /// Task graph or scheduler failed.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// The entity is not alive in the world.
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    /// Two systems registered under the same name.
    #[error("system registered twice: {0}")]
    DuplicateSystem(String),

    /// The entity allocator has no free index left.
    #[error("entity capacity exhausted: {capacity}")]
    EntitiesExhausted {
        /// Configured entity capacity.
        capacity: usize,
    },
}

/// Result type for runtime operations.
pub type TesseraResult<T> = Result<T, TesseraError>;
