//! # Job Front End
//!
//! Per-frame submission: systems submit jobs and wire dependencies between
//! them, then the whole batch is released at once.
//!
//! Every job is created held, so no job can start before the frame finished
//! wiring its dependencies.

use tracing::trace;

use crate::error::TaskResult;
use crate::graph::TaskRef;
use crate::route::ThreadRoute;
use crate::scheduler::Scheduler;

/// Collects one frame's jobs.
///
/// # Example
///
/// ```rust
/// use tessera_tasks::{JobProxy, Scheduler, SchedulerConfig};
///
/// let scheduler = Scheduler::start(SchedulerConfig::with_workers(2)).unwrap();
/// let mut jobs = JobProxy::new(&scheduler);
///
/// let load = jobs.submit("load", || {});
/// let simulate = jobs.submit("simulate", || {});
/// jobs.add_dependency(&load, &simulate).unwrap();
///
/// jobs.run();
/// assert!(simulate.is_completed());
/// ```
#[derive(Debug)]
pub struct JobProxy {
    scheduler: Scheduler,
    route: ThreadRoute,
    jobs: Vec<TaskRef>,
}

impl JobProxy {
    /// Front end submitting to any worker of `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::with_route(scheduler, ThreadRoute::ANY)
    }

    /// Front end submitting to `route`.
    #[must_use]
    pub fn with_route(scheduler: &Scheduler, route: ThreadRoute) -> Self {
        Self {
            scheduler: scheduler.clone(),
            route,
            jobs: Vec::new(),
        }
    }

    /// Scheduler jobs are submitted to.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Creates a held job.
    pub fn submit<F>(&mut self, name: impl Into<String>, body: F) -> TaskRef
    where
        F: FnOnce() + Send + 'static,
    {
        let job = self.scheduler.create_and_hold(name, body, &[], self.route);
        trace!(job = job.name(), "job submitted");
        self.jobs.push(job.clone());
        job
    }

    /// Makes `child` wait for `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TaskError::AlreadyLaunched`] if `child` was already
    /// dispatched and started.
    pub fn add_dependency(&self, parent: &TaskRef, child: &TaskRef) -> TaskResult<()> {
        child.add_prerequisite(parent)
    }

    /// Releases every submitted job.
    pub fn dispatch_all(&self) {
        for job in &self.jobs {
            job.dispatch();
        }
    }

    /// Blocks until every submitted job completed.
    pub fn wait_all(&self) {
        self.scheduler.wait_until_tasks_complete(&self.jobs);
    }

    /// Dispatches, waits and forgets the frame's jobs.
    pub fn run(&mut self) {
        self.dispatch_all();
        self.wait_all();
        self.jobs.clear();
    }

    /// Jobs submitted since the last [`JobProxy::run`].
    #[must_use]
    pub fn jobs(&self) -> &[TaskRef] {
        &self.jobs
    }

    /// Number of submitted jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if nothing was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
