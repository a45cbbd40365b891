//! Typed task wrapper and the shared handle to it.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, trace, warn};

use super::inline;
use super::node::{Launch, TaskNode};
use crate::error::{TaskError, TaskResult};

/// Object-safe view of a task, whatever its body type.
pub(crate) trait Task: Send + Sync {
    fn node(&self) -> &TaskNode;

    /// Runs the body and drops it. Later calls do nothing.
    fn run_body(&self);
}

/// Task whose body lives in the same allocation as its node.
pub(crate) struct GraphTask<F> {
    node: TaskNode,
    body: Mutex<Option<F>>,
}

impl<F> Task for GraphTask<F>
where
    F: FnOnce() + Send + 'static,
{
    fn node(&self) -> &TaskNode {
        &self.node
    }

    fn run_body(&self) {
        // Taken out first so the lock is not held while user code runs.
        let body = self.body.lock().take();
        if let Some(body) = body {
            body();
        }
    }
}

/// Shared handle to a task.
///
/// Cloning adds a reference, dropping releases one. The task is freed when
/// the last reference goes, whether held by callers, queues or other tasks.
#[derive(Clone)]
pub struct TaskRef(Arc<dyn Task>);

impl TaskRef {
    pub(crate) fn new<F>(name: impl Into<String>, body: F, launch: Launch) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Arc::new(GraphTask {
            node: TaskNode::new(name.into(), launch),
            body: Mutex::new(Some(body)),
        }))
    }

    #[inline]
    pub(crate) fn node(&self) -> &TaskNode {
        self.0.node()
    }

    /// Debug name given at creation.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node().name
    }

    /// Checks whether the body ran and dependents were released.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.node().completion.is_done()
    }

    /// Checks whether the task was handed to execution.
    #[inline]
    #[must_use]
    pub fn is_launched(&self) -> bool {
        self.node().launched.load(Ordering::Acquire)
    }

    /// Prerequisites that have not completed yet.
    #[inline]
    #[must_use]
    pub fn prerequisites_outstanding(&self) -> usize {
        self.node().prerequisites_outstanding()
    }

    /// Number of live references to this task.
    #[inline]
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Checks whether both handles point at the same task.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }

    /// Makes this task wait for `prerequisite`.
    ///
    /// A prerequisite that already completed records no edge.
    ///
    /// # Errors
    ///
    /// - [`TaskError::AlreadyLaunched`] if this task was already handed to execution
    /// - [`TaskError::SelfDependency`] if `prerequisite` is this task
    pub fn add_prerequisite(&self, prerequisite: &TaskRef) -> TaskResult<()> {
        if self.is_launched() {
            return Err(TaskError::AlreadyLaunched {
                task: self.name().to_owned(),
            });
        }
        if self.ptr_eq(prerequisite) {
            return Err(TaskError::SelfDependency {
                task: self.name().to_owned(),
            });
        }
        self.wire_prerequisite(prerequisite);
        Ok(())
    }

    /// Makes `subsequent` wait for this task.
    ///
    /// # Errors
    ///
    /// Same as [`TaskRef::add_prerequisite`] called on `subsequent`.
    pub fn add_subsequent(&self, subsequent: &TaskRef) -> TaskResult<()> {
        subsequent.add_prerequisite(self)
    }

    /// Records the edge. Returns false if the prerequisite had already completed.
    pub(crate) fn wire_prerequisite(&self, prerequisite: &TaskRef) -> bool {
        {
            let mut edges = prerequisite.node().edges.lock();
            if edges.closed {
                trace!(task = self.name(), prerequisite = prerequisite.name(), "prerequisite already complete");
                return false;
            }
            // Counted before the prerequisite can see us, so its notify never underflows.
            self.node().outstanding.fetch_add(1, Ordering::AcqRel);
            edges.subsequents.push(self.clone());
        }
        self.node()
            .edges
            .lock()
            .prerequisites
            .push(Arc::downgrade(&prerequisite.0));
        true
    }

    /// Releases the construction hold, or retries the launch if it is gone.
    ///
    /// A no-op on a task that already launched.
    pub fn dispatch(&self) {
        if self.node().held.swap(false, Ordering::AcqRel) {
            self.dependency_resolved();
        } else {
            self.try_launch();
        }
    }

    /// Blocks until the task completed.
    ///
    /// Calling this from inside a task body can deadlock when every worker
    /// ends up waiting.
    pub fn wait(&self) {
        self.node().completion.wait();
    }

    /// Blocks until the task completed or `timeout` passed.
    ///
    /// Returns whether the task completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.node().completion.wait_timeout(timeout)
    }

    /// One prerequisite (or the hold) resolved.
    pub(crate) fn dependency_resolved(&self) {
        if self.node().outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.try_launch();
        }
    }

    fn try_launch(&self) {
        let node = self.node();
        if node.outstanding.load(Ordering::Acquire) != 0 {
            return;
        }
        if node.launched.swap(true, Ordering::AcqRel) {
            return;
        }

        match &node.launch {
            Launch::Inline => self.execute(),
            Launch::Queue { route, scheduler } => match scheduler.upgrade() {
                Some(scheduler) => {
                    if let Err(e) = scheduler.queue_task(self.clone(), *route) {
                        error!(task = self.name(), %route, error = %e, "failed to queue ready task, running inline");
                        self.execute();
                    }
                }
                None => {
                    warn!(task = self.name(), %route, "scheduler dropped, running ready task inline");
                    self.execute();
                }
            },
        }
    }

    /// Runs the task on this thread. Dependents it makes ready inline run
    /// after it, from the same loop.
    pub(crate) fn execute(&self) {
        inline::run(self);
    }

    /// Runs the body, marks completion and releases every edge.
    pub(crate) fn execute_now(&self) {
        self.0.run_body();

        let (subsequents, prerequisites) = {
            let mut edges = self.node().edges.lock();
            edges.closed = true;
            (
                std::mem::take(&mut edges.subsequents),
                std::mem::take(&mut edges.prerequisites),
            )
        };

        self.node().completion.signal();
        trace!(task = self.name(), dependents = subsequents.len(), "task completed");

        {
            let _notifying = inline::notifying();
            for subsequent in subsequents {
                subsequent.dependency_resolved();
            }
        }
        drop(prerequisites);
    }
}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRef")
            .field("name", &self.name())
            .field("launched", &self.is_launched())
            .field("completed", &self.is_completed())
            .field("outstanding", &self.prerequisites_outstanding())
            .finish()
    }
}
