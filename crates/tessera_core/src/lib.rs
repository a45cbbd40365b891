//! # TESSERA Core Storage
//!
//! Lock-free component storage for task-parallel frame updates:
//! - Versioned slot caches that readers never block on
//! - Dense per-type component arrays with swap-remove deletion
//! - A registry that forwards entity destruction to every array
//!
//! ## Architecture Rules
//!
//! 1. **No locks on component values** - Every value sits in a versioned cache
//! 2. **Data-oriented design** - Components are stored in packed arrays
//! 3. **Structural changes are exclusive** - Insert and remove need `&mut`
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{ComponentArray, EntityAllocator, Position};
//!
//! let mut entities = EntityAllocator::new(1024);
//! let mut positions: ComponentArray<Position> = ComponentArray::new();
//!
//! let e = entities.allocate().unwrap();
//! positions.insert(e, Position::new(0.0, 1.0, 0.0)).unwrap();
//!
//! // Value access only needs a shared borrow.
//! positions.write(e).unwrap().0.y = 2.0;
//! assert_eq!(positions.get(e).unwrap().0.y, 2.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod error;
pub mod sync;

pub use ecs::{
    Component, ComponentArray, ComponentRegistry, ComponentStore, Entity, EntityAllocator,
    Position, Vec3, Velocity, DEFAULT_SLOTS, MAX_COMPONENTS_PER_ARRAY,
};
pub use error::{EcsError, EcsResult};
pub use sync::{ReadHandle, VersionedCache, WriteHandle, MAX_SLOTS};
