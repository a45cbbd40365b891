//! # Queued Thread Pool
//!
//! A standalone FIFO work pool, independent of the task graph.
//!
//! Work that is still queued when the pool is destroyed, or that arrives
//! afterwards, is never run: its [`QueuedWork::abandon`] is called instead.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::{TaskError, TaskResult};

/// A unit of work for [`QueuedThreadPool`].
pub trait QueuedWork: Send {
    /// Runs the work on a pool thread.
    fn do_threaded_work(self: Box<Self>);

    /// Called instead of [`QueuedWork::do_threaded_work`] when the pool shuts
    /// down first.
    fn abandon(self: Box<Self>) {}
}

impl<F> QueuedWork for F
where
    F: FnOnce() + Send,
{
    fn do_threaded_work(self: Box<Self>) {
        (*self)();
    }
}

#[derive(Default)]
struct PoolQueue {
    work: VecDeque<Box<dyn QueuedWork>>,
    stopping: bool,
}

/// Queue shared between the pool handle and its threads.
#[derive(Default)]
struct Shared {
    queue: Mutex<PoolQueue>,
    not_empty: Condvar,
}

impl Shared {
    /// Blocks until work is available. Returns `None` once stopping.
    fn next(&self) -> Option<Box<dyn QueuedWork>> {
        let mut queue = self.queue.lock();
        loop {
            if queue.stopping {
                return None;
            }
            if let Some(work) = queue.work.pop_front() {
                return Some(work);
            }
            self.not_empty.wait(&mut queue);
        }
    }
}

/// Fixed set of threads draining one FIFO queue.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tessera_tasks::QueuedThreadPool;
///
/// let mut pool = QueuedThreadPool::create(2, "io").unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&done);
/// pool.add_queued_work(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// while done.load(Ordering::SeqCst) == 0 {
///     std::thread::yield_now();
/// }
/// pool.destroy();
/// ```
pub struct QueuedThreadPool {
    name: String,
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl QueuedThreadPool {
    /// Spawns `num_threads` threads named `{name}-{index}`.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidConfig`] if `num_threads` is zero
    /// - [`TaskError::ThreadSpawn`] if a thread cannot be created
    pub fn create(num_threads: usize, name: impl Into<String>) -> TaskResult<Self> {
        let name = name.into();
        if num_threads == 0 {
            return Err(TaskError::InvalidConfig(format!(
                "pool {name} needs at least one thread"
            )));
        }

        let mut pool = Self {
            name,
            shared: Arc::new(Shared::default()),
            threads: Vec::with_capacity(num_threads),
        };

        for index in 0..num_threads {
            let thread_name = format!("{}-{index}", pool.name);
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    while let Some(work) = shared.next() {
                        work.do_threaded_work();
                    }
                });

            match spawned {
                Ok(handle) => pool.threads.push(handle),
                Err(e) => {
                    pool.destroy();
                    return Err(TaskError::ThreadSpawn {
                        name: thread_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(pool = %pool.name, threads = num_threads, "queued thread pool created");
        Ok(pool)
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live threads.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Number of queued items not yet picked up.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.shared.queue.lock().work.len()
    }

    /// Queues `work`. After [`QueuedThreadPool::destroy`] it is abandoned at once.
    pub fn add_queued_work<W>(&self, work: W)
    where
        W: QueuedWork + 'static,
    {
        self.add_boxed(Box::new(work));
    }

    /// Queues already boxed work.
    pub fn add_boxed(&self, work: Box<dyn QueuedWork>) {
        let mut queue = self.shared.queue.lock();
        if queue.stopping {
            drop(queue);
            debug!(pool = %self.name, "pool destroyed, abandoning new work");
            work.abandon();
            return;
        }
        queue.work.push_back(work);
        self.shared.not_empty.notify_one();
    }

    /// Stops and joins every thread, then abandons whatever is still queued.
    ///
    /// Idempotent.
    pub fn destroy(&mut self) {
        self.shared.queue.lock().stopping = true;
        self.shared.not_empty.notify_all();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!(pool = %self.name, "pool thread panicked");
            }
        }

        let leftover = std::mem::take(&mut self.shared.queue.lock().work);
        if !leftover.is_empty() {
            debug!(pool = %self.name, abandoned = leftover.len(), "abandoning queued work");
        }
        for work in leftover {
            work.abandon();
        }
    }
}

impl Drop for QueuedThreadPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for QueuedThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedThreadPool")
            .field("name", &self.name)
            .field("threads", &self.threads.len())
            .field("queued", &self.queued_len())
            .finish()
    }
}
