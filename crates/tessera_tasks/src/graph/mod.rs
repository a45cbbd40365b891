//! # Task Graph
//!
//! Reference-counted tasks that start once all their prerequisites completed.
//!
//! ## Lifecycle
//!
//! ```text
//!   created ──(hold released, prerequisites done)──▶ launched ──▶ executed ──▶ completed
//!      │                                                │                          │
//!      └── add_prerequisite allowed                      └── queued or inline       └── dependents notified
//! ```
//!
//! Every task starts with a construction hold counted like one extra
//! prerequisite. [`TaskRef::dispatch`] releases it, so a task never starts
//! while its edges are still being wired.
//!
//! Only prerequisites own their edges: a task keeps its dependents alive
//! until it notifies them, never the other way round.

mod factory;
mod inline;
mod node;
mod task;

pub use factory::{create_and_dispatch_when_ready, create_and_hold};
pub use task::TaskRef;

pub(crate) use factory::{dispatch_when_ready, hold};
pub(crate) use node::Launch;
