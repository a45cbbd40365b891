//! # Scheduler
//!
//! Routes ready tasks to named threads or to the anonymous worker pool.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──> game   [local][main] ──> tessera-game
//! ready task ──route──>├──> render [local][main] ──> tessera-render
//!                      │        (not started: run on the calling thread)
//!                      └──> any ──> channel ──┬──> tessera-worker-0
//!                                             └──> tessera-worker-N
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let scheduler = Scheduler::start(SchedulerConfig::with_workers(4))?;
//! let a = scheduler.create_and_dispatch_when_ready("a", || work(), &[], ThreadRoute::ANY);
//! let b = scheduler.create_and_dispatch_when_ready("b", || more(), &[a], ThreadRoute::ANY);
//! scheduler.wait_until_task_completes(&b);
//! ```

mod named;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use self::named::NamedThreadQueue;
use self::worker::{worker_loop, WorkerMessage};
use crate::config::SchedulerConfig;
use crate::error::{TaskError, TaskResult};
use crate::graph::{self, Launch, TaskRef};
use crate::route::{NamedThread, ThreadRoute};

/// Scheduler lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    /// Created, no thread running yet.
    NotStarted = 0,
    /// Threads running, tasks accepted.
    Running = 1,
    /// Shut down for good.
    Stopped = 2,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Counters shared with the scheduler threads.
#[derive(Default)]
pub(crate) struct SchedulerCounters {
    pub(crate) executed: AtomicU64,
    pub(crate) inline_fallbacks: AtomicU64,
    pub(crate) abandoned: AtomicU64,
    /// Run messages sent to the worker channel and not yet received.
    pub(crate) queued_runs: AtomicUsize,
}

/// Snapshot of scheduler activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks executed by named threads and workers.
    pub executed: u64,
    /// Tasks routed to a named thread that was not started, run by the caller.
    pub inline_fallbacks: u64,
    /// Tasks dropped without running at shutdown.
    pub abandoned: u64,
}

/// Shared scheduler state. Threads never hold it, so the last
/// [`Scheduler`] handle going away shuts everything down.
pub(crate) struct SchedulerInner {
    config: SchedulerConfig,
    state: AtomicU8,
    /// Join handles. The lock also serializes startup and shutdown.
    threads: Mutex<Vec<JoinHandle<()>>>,
    /// Submissions hold the read side across check and send. Shutdown
    /// flips the state under the write side.
    submit: RwLock<()>,
    named: [Arc<NamedThreadQueue>; NamedThread::COUNT],
    work_tx: Sender<WorkerMessage>,
    work_rx: Receiver<WorkerMessage>,
    stopping: Arc<AtomicBool>,
    counters: Arc<SchedulerCounters>,
}

impl SchedulerInner {
    fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn startup(&self) -> TaskResult<()> {
        let mut threads = self.threads.lock();
        match self.state() {
            SchedulerState::Running => return Ok(()),
            SchedulerState::Stopped => return Err(TaskError::SchedulerStopped),
            SchedulerState::NotStarted => {}
        }

        if let Err(e) = self.spawn_all(&mut threads) {
            self.stop_threads(&mut threads);
            return Err(e);
        }

        self.state.store(SchedulerState::Running as u8, Ordering::Release);
        info!(
            workers = self.config.worker_count,
            named = ?self.config.named_threads,
            "scheduler started"
        );
        Ok(())
    }

    fn spawn_all(&self, threads: &mut Vec<JoinHandle<()>>) -> TaskResult<()> {
        for &role in &self.config.named_threads {
            let queue = Arc::clone(&self.named[role.index()]);
            let counters = Arc::clone(&self.counters);
            threads.push(spawn_named(format!("tessera-{role}"), move || {
                queue.run(&counters);
            })?);
            self.named[role.index()].mark_started();
        }

        for index in 0..self.config.worker_count {
            let receiver = self.work_rx.clone();
            let stopping = Arc::clone(&self.stopping);
            let counters = Arc::clone(&self.counters);
            threads.push(spawn_named(
                format!("{}-{index}", self.config.worker_name_prefix),
                move || worker_loop(receiver, stopping, counters),
            )?);
        }
        Ok(())
    }

    fn shutdown(&self) {
        let mut threads = self.threads.lock();
        if self.state() == SchedulerState::Stopped {
            return;
        }
        self.stop_threads(&mut threads);

        let stats = self.stats();
        info!(
            executed = stats.executed,
            inline_fallbacks = stats.inline_fallbacks,
            abandoned = stats.abandoned,
            "scheduler stopped"
        );
    }

    /// Stops and joins every thread, abandoning whatever is still queued.
    fn stop_threads(&self, threads: &mut Vec<JoinHandle<()>>) {
        {
            let _gate = self.submit.write();
            // Workers must see `stopping` before anyone can observe the stopped state.
            self.stopping.store(true, Ordering::Release);
            self.state.store(SchedulerState::Stopped as u8, Ordering::Release);
        }

        for queue in &self.named {
            queue.stop();
        }
        for _ in 0..threads.len() {
            // Extra stops for named threads are drained below.
            let _ = self.work_tx.send(WorkerMessage::Stop);
        }

        let current = thread::current().id();
        for handle in threads.drain(..) {
            // Shutdown may run on a scheduler thread when a task drops the last handle.
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("unnamed").to_owned();
            if handle.join().is_err() {
                warn!(thread = %name, "scheduler thread panicked");
            }
        }

        let leftover = self
            .work_rx
            .try_iter()
            .filter(|message| matches!(message, WorkerMessage::Run(_)))
            .count();
        if leftover > 0 {
            debug!(abandoned = leftover, "dropping queued worker tasks");
            self.counters.queued_runs.fetch_sub(leftover, Ordering::Relaxed);
            self.counters
                .abandoned
                .fetch_add(leftover as u64, Ordering::Relaxed);
        }
    }

    /// Hands a launched task to its thread.
    ///
    /// A task accepted here is either run or counted as abandoned, even when
    /// shutdown races the call.
    pub(crate) fn queue_task(&self, task: TaskRef, route: ThreadRoute) -> TaskResult<()> {
        let fallback = {
            let _gate = self.submit.read();
            if self.state() != SchedulerState::Running {
                return Err(TaskError::NotRunning);
            }

            if route.is_any_thread() {
                self.counters.queued_runs.fetch_add(1, Ordering::Relaxed);
                return self.work_tx.send(WorkerMessage::Run(task)).map_err(|_| {
                    self.counters.queued_runs.fetch_sub(1, Ordering::Relaxed);
                    TaskError::NotRunning
                });
            }

            match route.named_thread().map(|role| &self.named[role.index()]) {
                Some(queue) if queue.is_started() => {
                    queue.push(task, route.is_local_queue());
                    return Ok(());
                }
                _ => task,
            }
        };

        // Run outside the gate: the body may queue more work or shut down.
        debug!(task = fallback.name(), %route, "named thread not started, running inline");
        self.counters.inline_fallbacks.fetch_add(1, Ordering::Relaxed);
        fallback.execute();
        Ok(())
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            executed: self.counters.executed.load(Ordering::Relaxed),
            inline_fallbacks: self.counters.inline_fallbacks.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
        }
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_named<F>(name: String, body: F) -> TaskResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|e| TaskError::ThreadSpawn {
            name,
            reason: e.to_string(),
        })
}

/// Cloneable handle to a task scheduler.
///
/// Dropping the last handle shuts the scheduler down.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a scheduler without starting any thread.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] if the config does not validate.
    pub fn new(config: SchedulerConfig) -> TaskResult<Self> {
        config.validate()?;
        let (work_tx, work_rx) = unbounded();

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: AtomicU8::new(SchedulerState::NotStarted as u8),
                threads: Mutex::new(Vec::new()),
                submit: RwLock::new(()),
                named: NamedThread::ALL.map(|role| Arc::new(NamedThreadQueue::new(role))),
                work_tx,
                work_rx,
                stopping: Arc::new(AtomicBool::new(false)),
                counters: Arc::new(SchedulerCounters::default()),
            }),
        })
    }

    /// Creates and starts a scheduler.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::new`] and [`Scheduler::startup`].
    pub fn start(config: SchedulerConfig) -> TaskResult<Self> {
        let scheduler = Self::new(config)?;
        scheduler.startup()?;
        Ok(scheduler)
    }

    /// Spawns the configured named threads and workers.
    ///
    /// Does nothing if already running.
    ///
    /// # Errors
    ///
    /// - [`TaskError::SchedulerStopped`] after [`Scheduler::shutdown`]
    /// - [`TaskError::ThreadSpawn`] if a thread cannot be created
    pub fn startup(&self) -> TaskResult<()> {
        self.inner.startup()
    }

    /// Stops and joins every thread. Queued tasks are dropped without running.
    ///
    /// Does nothing once stopped.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.inner.state()
    }

    /// Checks whether tasks are accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Configuration the scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Number of pool workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.inner.config.worker_count
    }

    /// Named threads that were started.
    #[must_use]
    pub fn named_threads(&self) -> Vec<NamedThread> {
        self.inner
            .named
            .iter()
            .filter(|queue| queue.is_started())
            .map(|queue| queue.thread())
            .collect()
    }

    /// Checks whether the worker queue holds tasks not yet picked up.
    #[must_use]
    pub fn is_processing_tasks(&self) -> bool {
        self.inner.counters.queued_runs.load(Ordering::Relaxed) > 0
    }

    /// Number of tasks waiting on `thread`'s queues.
    #[must_use]
    pub fn queued_on(&self, thread: NamedThread) -> usize {
        self.inner.named[thread.index()].len()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats()
    }

    fn launch(&self, route: ThreadRoute) -> Launch {
        Launch::Queue {
            route,
            scheduler: Arc::downgrade(&self.inner),
        }
    }

    /// Creates a task that is queued on `route` once every prerequisite completed.
    pub fn create_and_dispatch_when_ready<F>(
        &self,
        name: impl Into<String>,
        body: F,
        prerequisites: &[TaskRef],
        route: ThreadRoute,
    ) -> TaskRef
    where
        F: FnOnce() + Send + 'static,
    {
        graph::dispatch_when_ready(name, body, prerequisites, self.launch(route))
    }

    /// Creates a task that does not start on its own.
    ///
    /// If no prerequisite edge was recorded it waits for
    /// [`Scheduler::dispatch`]. Otherwise the last prerequisite to complete
    /// launches it.
    pub fn create_and_hold<F>(
        &self,
        name: impl Into<String>,
        body: F,
        prerequisites: &[TaskRef],
        route: ThreadRoute,
    ) -> TaskRef
    where
        F: FnOnce() + Send + 'static,
    {
        graph::hold(name, body, prerequisites, self.launch(route))
    }

    /// Releases a held task. A no-op on a task that already launched.
    pub fn dispatch(&self, task: &TaskRef) {
        task.dispatch();
    }

    /// Blocks until `task` completed.
    pub fn wait_until_task_completes(&self, task: &TaskRef) {
        task.wait();
    }

    /// Blocks until every task completed, waiting in order.
    pub fn wait_until_tasks_complete(&self, tasks: &[TaskRef]) {
        for task in tasks {
            task.wait();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("workers", &self.worker_count())
            .field("named", &self.named_threads())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counter_task(
        scheduler: &Scheduler,
        counter: &Arc<AtomicUsize>,
        route: ThreadRoute,
    ) -> TaskRef {
        let counter = Arc::clone(counter);
        scheduler.create_and_dispatch_when_ready(
            "count",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &[],
            route,
        )
    }

    #[test]
    fn test_lifecycle() {
        let scheduler = Scheduler::new(SchedulerConfig::with_workers(2)).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::NotStarted);

        scheduler.startup().unwrap();
        scheduler.startup().unwrap();
        assert!(scheduler.is_running());

        scheduler.shutdown();
        scheduler.shutdown();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.startup(), Err(TaskError::SchedulerStopped));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Scheduler::new(SchedulerConfig::with_workers(0)).unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig(_)));
    }

    #[test]
    fn test_worker_executes_task() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let task = counter_task(&scheduler, &counter, ThreadRoute::ANY);
        assert!(task.wait_timeout(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_named_thread_executes_task() {
        let config = SchedulerConfig::with_workers(1).with_named_thread(NamedThread::Render);
        let scheduler = Scheduler::start(config).unwrap();
        assert_eq!(scheduler.named_threads(), vec![NamedThread::Render]);

        let on_render = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&on_render);
        let task = scheduler.create_and_dispatch_when_ready(
            "render",
            move || *seen.lock() = thread::current().name().map(str::to_owned),
            &[],
            ThreadRoute::named(NamedThread::Render),
        );

        scheduler.wait_until_task_completes(&task);
        assert_eq!(on_render.lock().as_deref(), Some("tessera-render"));
    }

    #[test]
    fn test_not_started_named_thread_runs_inline() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let task = counter_task(&scheduler, &counter, ThreadRoute::named(NamedThread::Stats));

        // Ran on this thread before create returned.
        assert!(task.is_completed());
        assert_eq!(scheduler.stats().inline_fallbacks, 1);
    }

    #[test]
    fn test_not_running_runs_inline() {
        let scheduler = Scheduler::new(SchedulerConfig::with_workers(1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let task = counter_task(&scheduler, &counter, ThreadRoute::ANY);

        assert!(task.is_completed());
        assert_eq!(
            scheduler.inner.queue_task(task.clone(), ThreadRoute::ANY),
            Err(TaskError::NotRunning)
        );
    }

    #[test]
    fn test_dropped_scheduler_runs_inline() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let held = {
            let counter = Arc::clone(&counter);
            scheduler.create_and_hold(
                "orphan",
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                &[],
                ThreadRoute::ANY,
            )
        };

        drop(scheduler);
        held.dispatch();

        assert!(held.is_completed());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_long_chain_through_fallback_route() {
        const LINKS: usize = 200_000;
        let handle = thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let scheduler = Scheduler::start(SchedulerConfig::with_workers(1)).unwrap();
                let route = ThreadRoute::named(NamedThread::Audio);
                let root = scheduler.create_and_hold("root", || {}, &[], route);
                let mut last = root.clone();
                for _ in 0..LINKS {
                    last = scheduler.create_and_dispatch_when_ready("link", || {}, &[last], route);
                }
                scheduler.dispatch(&root);
                (last.is_completed(), scheduler.stats().inline_fallbacks)
            })
            .unwrap();

        let (completed, fallbacks) = handle.join().unwrap();
        assert!(completed);
        assert_eq!(fallbacks, LINKS as u64 + 1);
    }

    #[test]
    fn test_processing_counts_only_runs() {
        let scheduler = Scheduler::new(SchedulerConfig::with_workers(1)).unwrap();
        scheduler.inner.work_tx.send(WorkerMessage::Stop).unwrap();
        assert!(!scheduler.is_processing_tasks());
    }

    #[test]
    fn test_processing_tracks_queued_runs() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(1)).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let blocker = scheduler.create_and_dispatch_when_ready(
            "blocker",
            move || {
                let _ = release_rx.recv();
            },
            &[],
            ThreadRoute::ANY,
        );
        let queued = scheduler.create_and_dispatch_when_ready("queued", || {}, &[], ThreadRoute::ANY);

        // The single worker is busy with the blocker, so `queued` waits in the channel.
        assert!(scheduler.is_processing_tasks());

        release_tx.send(()).unwrap();
        scheduler.wait_until_tasks_complete(&[blocker, queued]);
        assert!(!scheduler.is_processing_tasks());
    }

    #[test]
    fn test_shutdown_race_accounts_every_task() {
        const SUBMITTERS: usize = 4;
        const PER_SUBMITTER: usize = 500;

        let scheduler = Scheduler::start(SchedulerConfig::with_workers(2)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..SUBMITTERS)
            .map(|_| {
                let scheduler = scheduler.clone();
                let ran = Arc::clone(&ran);
                thread::spawn(move || {
                    for _ in 0..PER_SUBMITTER {
                        counter_task(&scheduler, &ran, ThreadRoute::ANY);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(1));
        scheduler.shutdown();
        for submitter in submitters {
            submitter.join().unwrap();
        }

        // Rejected tasks ran on their submitter, the rest ran or were abandoned.
        let total = ran.load(Ordering::SeqCst) as u64 + scheduler.stats().abandoned;
        assert_eq!(total, (SUBMITTERS * PER_SUBMITTER) as u64);
        assert!(scheduler.inner.work_rx.is_empty());
        assert!(!scheduler.is_processing_tasks());
    }
}
