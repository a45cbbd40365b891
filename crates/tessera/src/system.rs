//! # Systems
//!
//! A system owns one slice of per-frame logic. It never touches entities
//! directly during an update: it submits jobs to the frame's [`JobProxy`],
//! and the manager releases the whole frame at once.
//!
//! ## Lifecycle
//!
//! ```text
//! register ──> init_all ──> update_all (every frame) ──> destroy_all
//!              (dependency order)                        (reverse order)
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tracing::{debug, info, trace};

use tessera_core::EcsError;
use tessera_tasks::{JobProxy, Scheduler};

use crate::error::{TesseraError, TesseraResult};

/// Per-frame logic driven by [`SystemManager`].
pub trait System: Send {
    /// Debug name, used in logs.
    fn name(&self) -> &str;

    /// Called once, after every system it depends on was initialized.
    fn on_init(&mut self) {}

    /// Submits this frame's work to `jobs`.
    fn on_update(&mut self, dt: f32, jobs: &mut JobProxy);

    /// Called once when the manager tears systems down.
    fn on_destroy(&mut self) {}
}

/// Registration data of a system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDescriptor {
    /// Unique system name.
    pub name: String,
    /// Systems that must be initialized first.
    pub init_deps: Vec<String>,
}

impl SystemDescriptor {
    /// Descriptor without dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_deps: Vec::new(),
        }
    }

    /// Adds an init dependency.
    #[must_use]
    pub fn depends_on(mut self, system: impl Into<String>) -> Self {
        self.init_deps.push(system.into());
        self
    }
}

struct Entry {
    descriptor: SystemDescriptor,
    system: Box<dyn System>,
    initialized: bool,
}

/// Owns systems and drives them frame by frame.
///
/// # Example
///
/// ```rust
/// use tessera::{System, SystemDescriptor, SystemManager};
/// use tessera::tasks::{JobProxy, Scheduler, SchedulerConfig};
///
/// struct Tick;
///
/// impl System for Tick {
///     fn name(&self) -> &str {
///         "tick"
///     }
///
///     fn on_update(&mut self, _dt: f32, jobs: &mut JobProxy) {
///         jobs.submit("tick", || {});
///     }
/// }
///
/// let scheduler = Scheduler::start(SchedulerConfig::with_workers(2)).unwrap();
/// let mut systems = SystemManager::new(&scheduler);
/// systems.register(SystemDescriptor::new("tick"), Tick).unwrap();
/// systems.init_all().unwrap();
///
/// assert_eq!(systems.update_all(1.0 / 60.0), 1);
/// systems.destroy_all();
/// ```
pub struct SystemManager {
    scheduler: Scheduler,
    entries: Vec<Entry>,
    /// Entry indices in dependency order, valid after `init_all`.
    order: Vec<usize>,
    frame: u64,
}

impl SystemManager {
    /// Manager submitting frame jobs to `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            scheduler: scheduler.clone(),
            entries: Vec::new(),
            order: Vec::new(),
            frame: 0,
        }
    }

    /// Adds a system. It takes part in frames after the next
    /// [`SystemManager::init_all`].
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::DuplicateSystem`] if the name is taken.
    pub fn register<S>(&mut self, descriptor: SystemDescriptor, system: S) -> TesseraResult<()>
    where
        S: System + 'static,
    {
        if self.entries.iter().any(|e| e.descriptor.name == descriptor.name) {
            return Err(TesseraError::DuplicateSystem(descriptor.name));
        }
        debug!(system = %descriptor.name, deps = ?descriptor.init_deps, "system registered");
        self.entries.push(Entry {
            descriptor,
            system: Box::new(system),
            initialized: false,
        });
        Ok(())
    }

    /// Initializes every system not yet initialized, dependencies first.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownSystem`] if a dependency was never registered
    /// - [`EcsError::CycleDetected`] if dependencies form a cycle
    ///
    /// Nothing is initialized when an error is returned.
    pub fn init_all(&mut self) -> TesseraResult<()> {
        self.order = self.sorted()?;

        for &index in &self.order {
            let entry = &mut self.entries[index];
            if !entry.initialized {
                entry.system.on_init();
                entry.initialized = true;
                debug!(system = %entry.descriptor.name, "system initialized");
            }
        }

        info!(systems = self.order.len(), "systems initialized");
        Ok(())
    }

    /// Kahn's algorithm over init dependencies. Ties keep registration order.
    fn sorted(&self) -> TesseraResult<Vec<usize>> {
        let by_name: HashMap<&str, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.descriptor.name.as_str(), index))
            .collect();

        let mut in_degree = vec![0usize; self.entries.len()];
        let mut dependents = vec![Vec::new(); self.entries.len()];
        for (index, entry) in self.entries.iter().enumerate() {
            for dep in &entry.descriptor.init_deps {
                let Some(&dep_index) = by_name.get(dep.as_str()) else {
                    return Err(EcsError::UnknownSystem {
                        system: entry.descriptor.name.clone(),
                        dependency: dep.clone(),
                    }
                    .into());
                };
                dependents[dep_index].push(index);
                in_degree[index] += 1;
            }
        }

        let mut ready: VecDeque<usize> = (0..self.entries.len())
            .filter(|&index| in_degree[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.entries.len());

        while let Some(index) = ready.pop_front() {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() < self.entries.len() {
            let stuck = in_degree
                .iter()
                .position(|&degree| degree > 0)
                .map_or_else(String::new, |index| self.entries[index].descriptor.name.clone());
            return Err(EcsError::CycleDetected(stuck).into());
        }
        Ok(order)
    }

    /// Runs one frame: every initialized system submits its jobs, then the
    /// frame's jobs are released together and awaited.
    ///
    /// Returns the number of jobs the frame ran.
    pub fn update_all(&mut self, dt: f32) -> usize {
        let started = Instant::now();
        let mut jobs = JobProxy::new(&self.scheduler);

        for &index in &self.order {
            let entry = &mut self.entries[index];
            if entry.initialized {
                entry.system.on_update(dt, &mut jobs);
            }
        }

        let submitted = jobs.len();
        jobs.run();
        self.frame += 1;

        trace!(
            frame = self.frame,
            jobs = submitted,
            elapsed_us = started.elapsed().as_micros(),
            "frame complete"
        );
        submitted
    }

    /// Destroys initialized systems in reverse init order.
    pub fn destroy_all(&mut self) {
        for &index in self.order.iter().rev() {
            let entry = &mut self.entries[index];
            if entry.initialized {
                entry.system.on_destroy();
                entry.initialized = false;
                debug!(system = %entry.descriptor.name, "system destroyed");
            }
        }
        self.order.clear();
    }

    /// System names in init order.
    #[must_use]
    pub fn init_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&index| self.entries[index].descriptor.name.as_str())
            .collect()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frames run so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.entries.len())
            .field("order", &self.init_order())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}
