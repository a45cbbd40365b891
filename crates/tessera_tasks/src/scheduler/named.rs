//! Named threads: one dedicated OS thread per role, each with a local and a
//! main queue. The local queue always drains first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::SchedulerCounters;
use crate::graph::TaskRef;
use crate::route::NamedThread;

#[derive(Default)]
struct QueuePair {
    local: VecDeque<TaskRef>,
    main: VecDeque<TaskRef>,
    stopping: bool,
}

impl QueuePair {
    fn pop(&mut self) -> Option<TaskRef> {
        self.local.pop_front().or_else(|| self.main.pop_front())
    }

    fn len(&self) -> usize {
        self.local.len() + self.main.len()
    }
}

/// Queues of one named thread.
pub(crate) struct NamedThreadQueue {
    thread: NamedThread,
    queues: Mutex<QueuePair>,
    not_empty: Condvar,
    started: AtomicBool,
}

impl NamedThreadQueue {
    pub(crate) fn new(thread: NamedThread) -> Self {
        Self {
            thread,
            queues: Mutex::new(QueuePair::default()),
            not_empty: Condvar::new(),
            started: AtomicBool::new(false),
        }
    }

    pub(crate) fn thread(&self) -> NamedThread {
        self.thread
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub(crate) fn push(&self, task: TaskRef, local: bool) {
        let mut queues = self.queues.lock();
        if local {
            queues.local.push_back(task);
        } else {
            queues.main.push_back(task);
        }
        self.not_empty.notify_one();
    }

    /// Blocks until a task is available. Returns `None` once stopping.
    fn pop_blocking(&self) -> Option<TaskRef> {
        let mut queues = self.queues.lock();
        loop {
            if queues.stopping {
                return None;
            }
            if let Some(task) = queues.pop() {
                return Some(task);
            }
            self.not_empty.wait(&mut queues);
        }
    }

    /// Asks the thread to exit after its current task.
    pub(crate) fn stop(&self) {
        self.queues.lock().stopping = true;
        self.not_empty.notify_all();
    }

    /// Number of queued tasks on both queues.
    pub(crate) fn len(&self) -> usize {
        self.queues.lock().len()
    }

    /// Thread body.
    pub(crate) fn run(&self, counters: &SchedulerCounters) {
        debug!(thread = %self.thread, "named thread running");

        while let Some(task) = self.pop_blocking() {
            task.execute();
            counters.executed.fetch_add(1, Ordering::Relaxed);
        }

        // Whatever is left never runs.
        let leftover = {
            let mut queues = self.queues.lock();
            let leftover = queues.len();
            queues.local.clear();
            queues.main.clear();
            leftover
        };
        counters.abandoned.fetch_add(leftover as u64, Ordering::Relaxed);
        debug!(thread = %self.thread, abandoned = leftover, "named thread stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;

    #[test]
    fn test_local_pops_before_main() {
        let queue = NamedThreadQueue::new(NamedThread::Game);
        let main = graph::create_and_hold("main", || {}, &[]);
        let local = graph::create_and_hold("local", || {}, &[]);

        queue.push(main.clone(), false);
        queue.push(local.clone(), true);

        assert!(queue.pop_blocking().unwrap().ptr_eq(&local));
        assert!(queue.pop_blocking().unwrap().ptr_eq(&main));
    }

    #[test]
    fn test_stop_abandons_queued() {
        let queue = NamedThreadQueue::new(NamedThread::Audio);
        let counters = SchedulerCounters::default();
        let task = graph::create_and_hold("never", || {}, &[]);
        queue.push(task.clone(), false);

        queue.stop();
        queue.run(&counters);

        assert!(!task.is_completed());
        assert_eq!(queue.len(), 0);
        assert_eq!(counters.abandoned.load(Ordering::Relaxed), 1);
    }
}
