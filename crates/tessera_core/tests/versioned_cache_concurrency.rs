//! # Versioned Cache Concurrency Tests
//!
//! One writer publishes a stream of multi-field values while several readers
//! hammer the cache. Every value a reader sees must be one the writer fully
//! committed.
//!
//! Run with: cargo test --package tessera_core --test versioned_cache_concurrency

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tessera_core::VersionedCache;

/// Wide enough that a torn read would show mismatched lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Frame {
    lanes: [u64; 16],
}

impl Frame {
    fn filled(value: u64) -> Self {
        Self { lanes: [value; 16] }
    }

    fn assert_consistent(&self) -> u64 {
        let first = self.lanes[0];
        assert!(
            self.lanes.iter().all(|&lane| lane == first),
            "torn read: {:?}",
            self.lanes
        );
        first
    }
}

fn run_stress<const N: usize>(readers: usize, writes: u64) {
    let cache: Arc<VersionedCache<Frame, N>> = Arc::new(VersionedCache::new());
    let done = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicU64::new(0));

    let reader_threads: Vec<_> = (0..readers)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            let observed = Arc::clone(&observed);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    if let Some(handle) = cache.read() {
                        let value = handle.assert_consistent();
                        assert!((1..=writes).contains(&value));
                        // Every successful write publishes exactly one version.
                        assert_eq!(handle.version(), value);
                        observed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for k in 1..=writes {
        while !cache.write(Frame::filled(k)) {
            thread::yield_now();
        }
    }
    done.store(true, Ordering::Release);

    for handle in reader_threads {
        handle.join().expect("reader thread panicked");
    }

    assert_eq!(cache.latest_version(), writes);
    assert_eq!(cache.read_value(), Some(Frame::filled(writes)));
    for slot in 0..N {
        assert_eq!(cache.reader_count(slot), 0);
        assert!(!cache.is_writing(slot));
    }
}

#[test]
fn test_two_slots_one_reader() {
    run_stress::<2>(1, 20_000);
}

#[test]
fn test_three_slots_four_readers() {
    run_stress::<3>(4, 20_000);
}

#[test]
fn test_single_slot_readers_never_see_writes_in_progress() {
    run_stress::<1>(2, 5_000);
}

#[test]
fn test_competing_writers_publish_whole_values() {
    let cache: Arc<VersionedCache<Frame, 4>> = Arc::new(VersionedCache::new());
    let writers: Vec<_> = (0..4u64)
        .map(|w| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut published = 0u64;
                for k in 0..2_000u64 {
                    if cache.write(Frame::filled(w * 10_000 + k + 1)) {
                        published += 1;
                    }
                }
                published
            })
        })
        .collect();

    let mut total = 0;
    for handle in writers {
        total += handle.join().expect("writer thread panicked");
    }

    // Failed claims publish nothing.
    assert_eq!(cache.latest_version(), total);
    if let Some(handle) = cache.read() {
        handle.assert_consistent();
    };
}
