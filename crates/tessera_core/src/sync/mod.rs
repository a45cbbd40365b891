//! # Synchronization Primitives for Multi-threaded Component Access
//!
//! No locks. No torn reads. Readers never block writers.
//!
//! ## The Problem
//!
//! ```text
//! Task A (worker 0):  WRITE the Position of entity 7
//! Task B (worker 1):  READ  the Position of entity 7
//!
//! Without synchronization: TORN READ → garbage position
//! With Mutex:              LOCK CONTENTION → workers idle
//! ```
//!
//! ## The Solution: Versioned Slots
//!
//! ```text
//!   slot 0: value v3  [readable, 2 readers]   <- newest, readers land here
//!   slot 1: value v2  [retired, writing]      <- oldest free slot, writer lands here
//! ```
//!
//! Every logical value owns N physical copies. Writers claim the oldest slot
//! nobody is reading, readers join the newest published slot. Publication is a
//! single atomic store, so a reader always sees a fully written value.

mod versioned;

pub use versioned::{ReadHandle, VersionedCache, WriteHandle, MAX_SLOTS};
