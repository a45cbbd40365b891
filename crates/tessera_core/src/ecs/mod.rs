//! # Entity Component System
//!
//! Dense component storage designed for concurrent frame tasks.
//!
//! ## Design Philosophy
//!
//! - Components are stored in dense arrays, removal swaps the last element in
//! - Every component value sits behind a versioned cache, never behind a lock
//! - Entity IDs are simple indices with generation counters
//! - Structural changes (insert, remove) take `&mut`, value access takes `&`

mod array;
mod component;
mod entity;
mod registry;

pub use array::{ComponentArray, DEFAULT_SLOTS, MAX_COMPONENTS_PER_ARRAY};
pub use component::{Component, Position, Vec3, Velocity};
pub use entity::{Entity, EntityAllocator};
pub use registry::{ComponentRegistry, ComponentStore};
