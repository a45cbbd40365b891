//! # Level Graph Timing
//!
//! Times full traversals of the layered DAG for growing graph sizes and
//! worker counts.
//!
//! ```bash
//! # Default worker counts
//! ./level_graph
//!
//! # Worker count and thread names from a scheduler config
//! ./level_graph scheduler.toml
//! ```

use std::time::Duration;

use tessera::tasks::{Scheduler, SchedulerConfig};
use tessera::LevelGraph;

/// (levels, nodes per level)
const SIZES: [(usize, usize); 4] = [(10, 100), (50, 200), (100, 500), (200, 1000)];

/// Busy-loop iterations per node.
const WORK_PER_NODE: u32 = 500;

fn main() {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                   TESSERA LEVEL GRAPH TIMING");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();

    let configs = match std::env::args().nth(1) {
        Some(path) => match SchedulerConfig::from_toml_file(&path) {
            Ok(config) => {
                println!("  Config:   {path}");
                vec![config]
            }
            Err(e) => {
                eprintln!("   ✗ FATAL: {e}");
                std::process::exit(1);
            }
        },
        None => worker_counts()
            .into_iter()
            .map(SchedulerConfig::with_workers)
            .collect(),
    };

    println!(
        "  {:>7} {:>8} {:>9} {:>8} {:>12} {:>12} {:>14}",
        "levels", "length", "nodes", "workers", "build", "traverse", "nodes/s"
    );
    println!("  ─────────────────────────────────────────────────────────────────────────");

    for config in configs {
        let scheduler = match Scheduler::start(config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("   ✗ FATAL: scheduler failed to start: {e}");
                std::process::exit(1);
            }
        };

        for (levels, length) in SIZES {
            let graph = LevelGraph::new(levels, length).with_work(WORK_PER_NODE);
            let report = graph.run(&scheduler);
            let ordered = if report.parents_finished_first(&graph) { "" } else { "  ✗ ORDER" };

            println!(
                "  {:>7} {:>8} {:>9} {:>8} {:>12} {:>12} {:>14.0}{ordered}",
                levels,
                length,
                graph.node_count(),
                report.workers,
                millis(report.build),
                millis(report.traversal),
                report.throughput(),
            );
        }

        let stats = scheduler.stats();
        println!(
            "  └─ executed {}, inline fallbacks {}, abandoned {}",
            stats.executed, stats.inline_fallbacks, stats.abandoned
        );
        scheduler.shutdown();
    }

    println!();
    println!("═══════════════════════════════════════════════════════════════════");
}

/// 1, 2, 4, ... up to the machine's parallelism, which is always included.
fn worker_counts() -> Vec<usize> {
    let max = std::thread::available_parallelism().map_or(1, usize::from);
    let mut counts: Vec<usize> = std::iter::successors(Some(1usize), |n| Some(n * 2))
        .take_while(|&n| n < max)
        .collect();
    counts.push(max);
    counts
}

fn millis(duration: Duration) -> String {
    format!("{:.2} ms", duration.as_secs_f64() * 1000.0)
}
