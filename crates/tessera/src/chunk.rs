//! Chunked job submission.

use std::sync::Arc;

use tessera_core::Entity;
use tessera_tasks::{JobProxy, TaskRef};

/// Splits `entities` into runs of `chunk_size` and submits one job per run.
///
/// Jobs are named `{name}-{chunk}` and share `f`. A `chunk_size` of zero is
/// treated as one. Returns the jobs in chunk order.
pub fn submit_chunks<F>(
    proxy: &mut JobProxy,
    entities: &[Entity],
    chunk_size: usize,
    name: &str,
    f: F,
) -> Vec<TaskRef>
where
    F: Fn(&[Entity]) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    entities
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(index, chunk)| {
            let f = Arc::clone(&f);
            let chunk = chunk.to_vec();
            proxy.submit(format!("{name}-{index}"), move || f(&chunk))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tessera_tasks::{Scheduler, SchedulerConfig};

    fn entities(count: u32) -> Vec<Entity> {
        (0..count).map(|i| Entity::new(i, 0)).collect()
    }

    #[test]
    fn test_every_entity_visited_once() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(4)).unwrap();
        let mut proxy = JobProxy::new(&scheduler);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let jobs = submit_chunks(&mut proxy, &entities(103), 10, "visit", move |chunk| {
            sink.lock().extend_from_slice(chunk);
        });
        assert_eq!(jobs.len(), 11);
        assert_eq!(jobs[10].name(), "visit-10");

        proxy.run();
        let mut seen = seen.lock().clone();
        seen.sort_by_key(|e| e.index());
        assert_eq!(seen, entities(103));
    }

    #[test]
    fn test_zero_chunk_size() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(1)).unwrap();
        let mut proxy = JobProxy::new(&scheduler);
        let jobs = submit_chunks(&mut proxy, &entities(3), 0, "tiny", |_| {});
        assert_eq!(jobs.len(), 3);
    }

    #[test]
    fn test_no_entities_no_jobs() {
        let scheduler = Scheduler::start(SchedulerConfig::with_workers(1)).unwrap();
        let mut proxy = JobProxy::new(&scheduler);
        assert!(submit_chunks(&mut proxy, &[], 8, "none", |_| {}).is_empty());
        assert!(proxy.is_empty());
    }
}
