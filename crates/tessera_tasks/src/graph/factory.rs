//! Task construction: build the wrapper, wire prerequisites, start or hold.

use super::node::Launch;
use super::task::TaskRef;

/// Builds a task and wires every prerequisite. The construction hold stays in place.
///
/// Also returns whether any edge was recorded.
fn build<F>(name: impl Into<String>, body: F, prerequisites: &[TaskRef], launch: Launch) -> (TaskRef, bool)
where
    F: FnOnce() + Send + 'static,
{
    let task = TaskRef::new(name, body, launch);
    let mut wired = false;
    for prerequisite in prerequisites {
        if !task.ptr_eq(prerequisite) {
            wired |= task.wire_prerequisite(prerequisite);
        }
    }
    (task, wired)
}

pub(crate) fn dispatch_when_ready<F>(
    name: impl Into<String>,
    body: F,
    prerequisites: &[TaskRef],
    launch: Launch,
) -> TaskRef
where
    F: FnOnce() + Send + 'static,
{
    let (task, _) = build(name, body, prerequisites, launch);
    task.dispatch();
    task
}

pub(crate) fn hold<F>(
    name: impl Into<String>,
    body: F,
    prerequisites: &[TaskRef],
    launch: Launch,
) -> TaskRef
where
    F: FnOnce() + Send + 'static,
{
    let (task, wired) = build(name, body, prerequisites, launch);
    release_hold_if_wired(&task, wired);
    task
}

/// Hands the hold over to the wired prerequisites: the last one to complete
/// launches the task. Decided by the wiring alone, so a prerequisite that
/// finishes right after its edge was recorded still launches the task.
fn release_hold_if_wired(task: &TaskRef, wired: bool) {
    if wired {
        task.dispatch();
    }
}

/// Creates a task that runs inline as soon as every prerequisite completed.
///
/// With no pending prerequisites the body runs before this returns.
///
/// # Example
///
/// ```rust
/// use tessera_tasks::graph;
///
/// let first = graph::create_and_hold("first", || {}, &[]);
/// let second = graph::create_and_dispatch_when_ready("second", || {}, &[first.clone()]);
/// assert!(!second.is_completed());
///
/// first.dispatch();
/// assert!(second.is_completed());
/// ```
pub fn create_and_dispatch_when_ready<F>(
    name: impl Into<String>,
    body: F,
    prerequisites: &[TaskRef],
) -> TaskRef
where
    F: FnOnce() + Send + 'static,
{
    dispatch_when_ready(name, body, prerequisites, Launch::Inline)
}

/// Creates an inline task that does not start on its own.
///
/// A task that recorded no edge, because it has no prerequisites or all of
/// them had completed, waits for [`TaskRef::dispatch`]. A task that recorded
/// an edge is launched once the last of its prerequisites completes.
pub fn create_and_hold<F>(name: impl Into<String>, body: F, prerequisites: &[TaskRef]) -> TaskRef
where
    F: FnOnce() + Send + 'static,
{
    hold(name, body, prerequisites, Launch::Inline)
}
