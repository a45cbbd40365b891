//! # ECS Error Types
//!
//! All errors that can occur while storing and accessing components.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in component storage and system bookkeeping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Component inserted twice for the same entity.
    #[error("component {component} added to entity {entity} more than once")]
    DuplicateComponent {
        /// The entity that already holds the component.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Access to a component the entity does not hold.
    #[error("entity {entity} has no {component} component")]
    MissingComponent {
        /// The entity that was looked up.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// The component array is full.
    #[error("component array for {component} is full: capacity {capacity}")]
    CapacityExceeded {
        /// Component type name.
        component: &'static str,
        /// Fixed capacity of the array.
        capacity: usize,
    },

    /// No slot of the entity's cache is currently readable.
    #[error("no published {component} value for entity {entity}")]
    NotPublished {
        /// The entity that was read.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Every slot of the entity's cache is being read or written.
    #[error("no writable {component} slot for entity {entity}, try again")]
    NoWritableSlot {
        /// The entity that was written.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Component array not present in the registry.
    #[error("component array not registered: {0}")]
    NotRegistered(&'static str),

    /// Component array registered twice.
    #[error("component array already registered: {0}")]
    AlreadyRegistered(&'static str),

    /// Detected a cycle in system initialization dependencies.
    #[error("cycle detected in system init dependencies involving {0}")]
    CycleDetected(String),

    /// A system depends on a system nobody registered.
    #[error("system {system} depends on unknown system {dependency}")]
    UnknownSystem {
        /// The dependent system.
        system: String,
        /// The missing dependency.
        dependency: String,
    },
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
