//! # Level Graph Benchmark
//!
//! Traversal of the layered DAG and one movement frame.
//!
//! Run with: `cargo bench --package tessera`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera::core::{Position, Velocity};
use tessera::tasks::{Scheduler, SchedulerConfig};
use tessera::{LevelGraph, MovementSystem, SystemDescriptor, SystemManager, World};

/// Benchmark: wire and traverse a 50x200 graph.
fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_graph");
    let graph = LevelGraph::new(50, 200);

    for workers in [1usize, 2, 4] {
        let Ok(scheduler) = Scheduler::start(SchedulerConfig::with_workers(workers)) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| graph.run(&scheduler));
        });
    }

    group.finish();
}

/// Benchmark: one frame moving 4096 entities.
fn bench_movement_frame(c: &mut Criterion) {
    let Ok(scheduler) = Scheduler::start(SchedulerConfig::with_workers(4)) else {
        return;
    };

    let world = Arc::new(World::new(4096));
    for i in 0..4096u16 {
        let Ok(e) = world.spawn() else { break };
        let _ = world.insert(e, Position::new(f32::from(i), 0.0, 0.0));
        let _ = world.insert(e, Velocity::new(1.0, 1.0, 1.0));
    }

    let mut systems = SystemManager::new(&scheduler);
    if systems
        .register(SystemDescriptor::new(MovementSystem::NAME), MovementSystem::new(Arc::clone(&world)))
        .and_then(|()| systems.init_all())
        .is_err()
    {
        return;
    }

    c.bench_function("movement_frame_4096", |b| {
        b.iter(|| systems.update_all(1.0 / 60.0));
    });
}

criterion_group!(benches, bench_traversal, bench_movement_frame);
criterion_main!(benches);
