//! # Level Graph
//!
//! Layered DAG workload for exercising the scheduler.
//!
//! ```text
//! level 0:   n0   n1   n2   n3        every node waits on the trigger
//!             │ ╲  │ ╲  │    │
//! level 1:   n0   n1   n2   n3        up to two parents from the level above
//!             ⋮
//! ```
//!
//! The shape is a pure function of `(levels, length)`, so runs are
//! comparable across worker counts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use tessera_tasks::{Scheduler, TaskRef, ThreadRoute};

/// Visit stamp of a node that never ran.
pub const NOT_VISITED: usize = usize::MAX;

/// Deterministic layered DAG.
#[derive(Debug, Clone)]
pub struct LevelGraph {
    levels: usize,
    length: usize,
    work: u32,
    /// Parents of each node, by flat node id.
    parents: Vec<Vec<usize>>,
}

impl LevelGraph {
    /// Builds `levels` layers of `length` nodes.
    ///
    /// Node `i` of level `L > 0` depends on node `i` and node
    /// `(7i + 3) mod length` of level `L - 1`, or just one of them when both
    /// coincide.
    ///
    /// # Panics
    ///
    /// Panics if `levels` or `length` is zero.
    #[must_use]
    pub fn new(levels: usize, length: usize) -> Self {
        assert!(levels > 0 && length > 0, "Level graph needs at least one node");

        let mut parents = Vec::with_capacity(levels * length);
        parents.extend((0..length).map(|_| Vec::new()));
        for level in 1..levels {
            let above = (level - 1) * length;
            for i in 0..length {
                let straight = above + i;
                let skewed = above + (i * 7 + 3) % length;
                parents.push(if straight == skewed {
                    vec![straight]
                } else {
                    vec![straight, skewed]
                });
            }
        }

        Self {
            levels,
            length,
            work: 0,
            parents,
        }
    }

    /// Busy-loop iterations each node body spins for.
    #[must_use]
    pub fn with_work(mut self, iterations: u32) -> Self {
        self.work = iterations;
        self
    }

    /// Number of levels.
    #[must_use]
    pub const fn levels(&self) -> usize {
        self.levels
    }

    /// Nodes per level.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.parents.len()
    }

    /// Total number of edges, the trigger's excluded.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    /// Flat ids of the parents of `node`.
    #[must_use]
    pub fn parents(&self, node: usize) -> &[usize] {
        &self.parents[node]
    }

    /// Wires one held task per node behind a single held trigger.
    ///
    /// Nothing runs until [`LevelGraphRun::start`].
    #[must_use]
    pub fn build_tasks(&self, scheduler: &Scheduler) -> LevelGraphRun {
        let visits = Arc::new(VisitLog::new(self.node_count()));
        let trigger = scheduler.create_and_hold("level-trigger", || {}, &[], ThreadRoute::ANY);

        let mut nodes: Vec<TaskRef> = Vec::with_capacity(self.node_count());
        for (id, parents) in self.parents.iter().enumerate() {
            let prerequisites: Vec<TaskRef> = if parents.is_empty() {
                vec![trigger.clone()]
            } else {
                parents.iter().map(|&p| nodes[p].clone()).collect()
            };

            let visits = Arc::clone(&visits);
            let work = self.work;
            let body = move || {
                visits.enter(id);
                spin(work);
                visits.leave(id);
            };
            let name = format!("node-{}-{}", id / self.length, id % self.length);
            nodes.push(scheduler.create_and_hold(name, body, &prerequisites, ThreadRoute::ANY));
        }

        debug!(nodes = nodes.len(), edges = self.edge_count(), "level graph wired");
        LevelGraphRun {
            trigger,
            nodes,
            last_level: (self.levels - 1) * self.length,
            visits,
        }
    }

    /// Wires, releases and awaits one traversal.
    #[must_use]
    pub fn run(&self, scheduler: &Scheduler) -> TraversalReport {
        let build_started = Instant::now();
        let run = self.build_tasks(scheduler);
        let build = build_started.elapsed();

        let started = Instant::now();
        run.start(scheduler);
        run.wait(scheduler);
        let traversal = started.elapsed();

        debug!(
            nodes = self.node_count(),
            workers = scheduler.worker_count(),
            traversal_us = traversal.as_micros(),
            "level graph traversed"
        );
        TraversalReport {
            workers: scheduler.worker_count(),
            build,
            traversal,
            started: run.visits.started(),
            finished: run.visits.finished(),
        }
    }
}

/// Spins without letting the optimizer drop the loop.
fn spin(iterations: u32) {
    let mut acc = 0u64;
    for i in 0..iterations {
        acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(u64::from(i)));
    }
    std::hint::black_box(acc);
}

/// Shared clock stamping node entry and exit.
#[derive(Debug)]
struct VisitLog {
    clock: AtomicUsize,
    started: Vec<AtomicUsize>,
    finished: Vec<AtomicUsize>,
}

impl VisitLog {
    fn new(nodes: usize) -> Self {
        Self {
            clock: AtomicUsize::new(0),
            started: (0..nodes).map(|_| AtomicUsize::new(NOT_VISITED)).collect(),
            finished: (0..nodes).map(|_| AtomicUsize::new(NOT_VISITED)).collect(),
        }
    }

    fn enter(&self, node: usize) {
        let stamp = self.clock.fetch_add(1, Ordering::AcqRel);
        self.started[node].store(stamp, Ordering::Release);
    }

    fn leave(&self, node: usize) {
        let stamp = self.clock.fetch_add(1, Ordering::AcqRel);
        self.finished[node].store(stamp, Ordering::Release);
    }

    fn started(&self) -> Vec<usize> {
        self.started.iter().map(|s| s.load(Ordering::Acquire)).collect()
    }

    fn finished(&self) -> Vec<usize> {
        self.finished.iter().map(|s| s.load(Ordering::Acquire)).collect()
    }
}

/// Tasks of one wired traversal.
#[derive(Debug)]
pub struct LevelGraphRun {
    trigger: TaskRef,
    nodes: Vec<TaskRef>,
    last_level: usize,
    visits: Arc<VisitLog>,
}

impl LevelGraphRun {
    /// The held task every level-0 node waits on.
    #[must_use]
    pub fn trigger(&self) -> &TaskRef {
        &self.trigger
    }

    /// Node tasks by flat id.
    #[must_use]
    pub fn nodes(&self) -> &[TaskRef] {
        &self.nodes
    }

    /// Releases the trigger.
    pub fn start(&self, scheduler: &Scheduler) {
        scheduler.dispatch(&self.trigger);
    }

    /// Waits on the last level, then on nodes that feed nowhere.
    pub fn wait(&self, scheduler: &Scheduler) {
        scheduler.wait_until_tasks_complete(&self.nodes[self.last_level..]);
        scheduler.wait_until_tasks_complete(&self.nodes[..self.last_level]);
    }
}

/// Outcome of [`LevelGraph::run`].
#[derive(Debug, Clone)]
pub struct TraversalReport {
    /// Worker threads of the scheduler.
    pub workers: usize,
    /// Time spent wiring tasks.
    pub build: Duration,
    /// Time from releasing the trigger to the last completion.
    pub traversal: Duration,
    /// Clock stamp at which each node's body started.
    pub started: Vec<usize>,
    /// Clock stamp at which each node's body finished.
    pub finished: Vec<usize>,
}

impl TraversalReport {
    /// Checks whether every node ran.
    #[must_use]
    pub fn all_visited(&self) -> bool {
        self.started
            .iter()
            .chain(&self.finished)
            .all(|&stamp| stamp != NOT_VISITED)
    }

    /// Checks that each node started only after all its parents finished.
    #[must_use]
    pub fn parents_finished_first(&self, graph: &LevelGraph) -> bool {
        (0..graph.node_count()).all(|node| {
            graph
                .parents(node)
                .iter()
                .all(|&parent| self.finished[parent] < self.started[node])
        })
    }

    /// Nodes per second over the traversal.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let seconds = self.traversal.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let nodes = self.started.len() as f64;
        nodes / seconds
    }
}
