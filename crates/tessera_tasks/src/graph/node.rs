//! Per-task bookkeeping: counters, edges, completion signal and launch hook.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Weak;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::task::{Task, TaskRef};
use crate::route::ThreadRoute;
use crate::scheduler::SchedulerInner;

/// What happens once a task's prerequisites are all satisfied.
pub(crate) enum Launch {
    /// Execute on whichever thread resolved the last prerequisite.
    Inline,
    /// Hand the task to the scheduler.
    Queue {
        /// Destination thread and queue.
        route: ThreadRoute,
        /// Weak so queued tasks do not keep a dropped scheduler alive.
        scheduler: Weak<SchedulerInner>,
    },
}

/// One-shot completion flag that threads can block on.
pub(crate) struct CompletionSignal {
    done: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl CompletionSignal {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    pub(crate) fn signal(&self) {
        // Taken so a waiter cannot miss the notify between its check and its sleep.
        let _guard = self.mutex.lock();
        self.done.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn wait(&self) {
        if self.is_done() {
            return;
        }
        let mut guard = self.mutex.lock();
        while !self.is_done() {
            self.condvar.wait(&mut guard);
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_done() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.mutex.lock();
        while !self.is_done() {
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                return self.is_done();
            }
        }
        true
    }
}

/// Edge lists, guarded by the node's mutex.
///
/// Only the prerequisite side owns an edge. A graph nobody holds a handle to
/// is freed even if it never ran.
#[derive(Default)]
pub(crate) struct Edges {
    /// Tasks this one waits on. Not owned: they are kept alive by whoever
    /// will launch them.
    pub(crate) prerequisites: Vec<Weak<dyn Task>>,
    /// Tasks to notify on completion, referenced until notified.
    pub(crate) subsequents: Vec<TaskRef>,
    /// Set once the subsequents were drained. Late dependents see a satisfied edge.
    pub(crate) closed: bool,
}

impl Drop for Edges {
    /// Unlinks dependents one at a time so dropping a long unrun chain does
    /// not recurse once per link.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.subsequents);
        while let Some(task) = pending.pop() {
            if task.ref_count() == 1 {
                pending.append(&mut task.node().edges.lock().subsequents);
            }
        }
    }
}

/// State shared by every task regardless of its body type.
pub(crate) struct TaskNode {
    pub(crate) name: String,
    /// Unresolved prerequisites plus one while the construction hold is in place.
    pub(crate) outstanding: AtomicUsize,
    /// Construction hold not yet released.
    pub(crate) held: AtomicBool,
    /// Body handed to execution.
    pub(crate) launched: AtomicBool,
    pub(crate) edges: Mutex<Edges>,
    pub(crate) completion: CompletionSignal,
    pub(crate) launch: Launch,
}

impl TaskNode {
    pub(crate) fn new(name: String, launch: Launch) -> Self {
        Self {
            name,
            outstanding: AtomicUsize::new(1),
            held: AtomicBool::new(true),
            launched: AtomicBool::new(false),
            edges: Mutex::new(Edges::default()),
            completion: CompletionSignal::new(),
            launch,
        }
    }

    /// Outstanding prerequisites, not counting the construction hold.
    pub(crate) fn prerequisites_outstanding(&self) -> usize {
        let held = usize::from(self.held.load(Ordering::Acquire));
        self.outstanding.load(Ordering::Acquire).saturating_sub(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_signal_wakes_waiter() {
        let signal = Arc::new(CompletionSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };

        thread::sleep(Duration::from_millis(10));
        signal.signal();
        waiter.join().unwrap();
        assert!(signal.is_done());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let signal = CompletionSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
        signal.signal();
        assert!(signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_new_node_is_held() {
        let node = TaskNode::new("n".to_owned(), Launch::Inline);
        assert_eq!(node.outstanding.load(Ordering::Relaxed), 1);
        assert_eq!(node.prerequisites_outstanding(), 0);
    }
}
