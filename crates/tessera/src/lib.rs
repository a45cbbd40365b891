//! # TESSERA
//!
//! The frame runtime, tying component storage to the task graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            TESSERA RUNTIME                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐   │
//! │  │  tessera_core   │     │     World       │     │  tessera_tasks  │   │
//! │  │                 │────>│                 │<────│                 │   │
//! │  │  • Entities     │     │  • Allocator    │     │  • Task graph   │   │
//! │  │  • Dense arrays │     │  • Registry     │     │  • Scheduler    │   │
//! │  │  • Versioned    │     │    (RwLock)     │     │  • Job proxy    │   │
//! │  │    caches       │     └────────┬────────┘     └────────┬────────┘   │
//! │  └─────────────────┘              │                       │            │
//! │                          ┌────────▼───────────────────────▼────────┐   │
//! │                          │            SystemManager                │   │
//! │                          │  init order • per-frame jobs • destroy  │   │
//! │                          └─────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `world`: Entity allocator and component registry shared by frame jobs
//! - `system`: System lifecycle and frame updates
//! - `chunk`: Splitting entity lists into jobs
//! - `movement`: Position integration system
//! - `level_graph`: Layered DAG traversal workload

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod error;
pub mod level_graph;
pub mod movement;
pub mod system;
pub mod world;

// Re-export the layers
pub use tessera_core as core;
pub use tessera_tasks as tasks;

// Re-export commonly used types
pub use chunk::submit_chunks;
pub use error::{TesseraError, TesseraResult};
pub use level_graph::{LevelGraph, LevelGraphRun, TraversalReport};
pub use movement::MovementSystem;
pub use system::{System, SystemDescriptor, SystemManager};
pub use world::World;
