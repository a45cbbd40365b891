//! # TESSERA Task Graph
//!
//! Dependency-driven parallel task execution:
//! - Reference-counted tasks that start once their prerequisites completed
//! - A scheduler routing ready tasks to named threads or a worker pool
//! - A standalone queued thread pool and a per-frame job front end
//!
//! ## Architecture Rules
//!
//! 1. **Readiness is counted, never polled** - The last prerequisite launches its dependent
//! 2. **Every task launches at most once** - Racing dispatches are harmless
//! 3. **No global state** - The scheduler is an explicit handle
//!
//! ## Example
//!
//! ```rust
//! use tessera_tasks::{Scheduler, SchedulerConfig, ThreadRoute};
//!
//! let scheduler = Scheduler::start(SchedulerConfig::with_workers(2)).unwrap();
//!
//! let root = scheduler.create_and_hold("root", || {}, &[], ThreadRoute::ANY);
//! let leaf = scheduler.create_and_dispatch_when_ready("leaf", || {}, &[root.clone()], ThreadRoute::ANY);
//!
//! scheduler.dispatch(&root);
//! scheduler.wait_until_task_completes(&leaf);
//! assert!(root.is_completed());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod graph;
pub mod jobs;
pub mod pool;
pub mod route;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::{TaskError, TaskResult};
pub use graph::TaskRef;
pub use jobs::JobProxy;
pub use pool::{QueuedThreadPool, QueuedWork};
pub use route::{NamedThread, ThreadRoute};
pub use scheduler::{Scheduler, SchedulerState, SchedulerStats};
