//! Anonymous worker pool fed by one shared channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::trace;

use super::SchedulerCounters;
use crate::graph::TaskRef;

/// Message on the shared worker queue.
pub(crate) enum WorkerMessage {
    /// Execute a ready task.
    Run(TaskRef),
    /// Exit the loop. One is sent per worker.
    Stop,
}

/// Thread body of one pool worker.
///
/// Blocks only on the channel. Tasks received after shutdown began are
/// dropped without running.
pub(crate) fn worker_loop(
    receiver: Receiver<WorkerMessage>,
    stopping: Arc<AtomicBool>,
    counters: Arc<SchedulerCounters>,
) {
    for message in receiver.iter() {
        match message {
            WorkerMessage::Run(task) => {
                counters.queued_runs.fetch_sub(1, Ordering::Relaxed);
                if stopping.load(Ordering::Acquire) {
                    trace!(task = task.name(), "abandoning task, scheduler stopping");
                    counters.abandoned.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                task.execute();
                counters.executed.fetch_add(1, Ordering::Relaxed);
            }
            WorkerMessage::Stop => break,
        }
    }
}
