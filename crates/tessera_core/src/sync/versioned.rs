//! # Versioned Slot Cache
//!
//! Lock-free single-value store with N physical copies.
//!
//! ## Safety Note
//!
//! This module requires unsafe code to hand out references into slots that
//! are shared between threads. Every unsafe block relies on the slot state
//! machine documented below.

#![allow(unsafe_code)]
//!
//! ## Slot State Machine
//!
//! Each slot packs its whole coordination state into one `AtomicU32`:
//!
//! ```text
//!   bit 31      bit 30       bits 0..30
//! ┌─────────┬────────────┬──────────────┐
//! │ WRITING │  READABLE  │ reader count │
//! └─────────┴────────────┴──────────────┘
//!
//!        claim (CAS, readers == 0)             publish (store)
//!  FREE ───────────────────────────▶ WRITING ───────────────────▶ READABLE
//!   ▲      READABLE is cleared here            version bumped      │  ▲
//!   │                                                              │  │ join / leave
//!   └──────────────── claim again once readers drain ──────────────┘  (CAS, fetch_sub)
//! ```
//!
//! A writer retires the slot it claims: the claim clears `READABLE` in the
//! same atomic operation that sets `WRITING`, and a reader may only join a
//! slot through a compare-exchange that requires `READABLE && !WRITING`.
//! A slot that is being mutated can therefore never be selected for reading.
//!
//! ## Thread Safety
//!
//! - `ReadHandle`: shared access to one published slot (many allowed)
//! - `WriteHandle`: exclusive access to one retired slot (one per slot)
//! - Neither `read()` nor `write_handle()` ever blocks

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Largest supported slot count.
pub const MAX_SLOTS: usize = u8::MAX as usize;

/// Slot is claimed by a writer.
const WRITING: u32 = 1 << 31;
/// Slot holds a published value.
const READABLE: u32 = 1 << 30;
/// Active reader count.
const READERS_MASK: u32 = READABLE - 1;

/// Version of a slot that has never been published.
const NULL_VERSION: u64 = 0;

/// One physical copy of the cached value.
struct Slot<T> {
    value: UnsafeCell<T>,
    version: AtomicU64,
    state: AtomicU32,
}

impl<T> Slot<T> {
    fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            version: AtomicU64::new(NULL_VERSION),
            state: AtomicU32::new(0),
        }
    }

    /// Registers one more reader if the slot is still published.
    fn try_join(&self) -> bool {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & READABLE == 0 || state & WRITING != 0 {
                return false;
            }
            debug_assert!(state & READERS_MASK < READERS_MASK, "reader count overflow");
            match self.state.compare_exchange_weak(
                state,
                state + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    fn leave(&self) {
        self.state.fetch_sub(1, Ordering::Release);
    }
}

/// Lock-free cache of one logical value held in `N` versioned slots.
///
/// Readers always see the newest fully published copy. Writers fill the
/// oldest copy nobody is reading and publish it under a fresh version number.
///
/// ## Usage
///
/// ```rust
/// use tessera_core::VersionedCache;
///
/// let cache: VersionedCache<u64, 2> = VersionedCache::new();
/// assert!(cache.read().is_none()); // nothing published yet
///
/// assert!(cache.write(7));
/// assert_eq!(*cache.read().unwrap(), 7);
///
/// {
///     let mut handle = cache.write_handle().unwrap();
///     *handle = 8;
/// } // published here
/// assert_eq!(*cache.read().unwrap(), 8);
/// ```
pub struct VersionedCache<T, const N: usize> {
    slots: [Slot<T>; N],
    /// Bumped once per publish.
    global_version: AtomicU64,
}

impl<T: Default, const N: usize> VersionedCache<T, N> {
    /// Creates a cache whose slots all hold `T::default()`.
    ///
    /// No slot is readable until the first write is published.
    #[must_use]
    pub fn new() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T: Default, const N: usize> Default for VersionedCache<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> VersionedCache<T, N> {
    /// Compile-time check on the slot count.
    const VALID_SLOT_COUNT: () = assert!(N > 0 && N <= MAX_SLOTS, "slot count must be 1..=255");

    /// Number of physical slots.
    pub const SLOTS: usize = N;

    /// Creates a cache, initializing slot `i` with `init(i)`.
    ///
    /// The initial contents are never observed by readers; they only matter
    /// for a write handle that is published without being modified.
    #[must_use]
    pub fn from_fn(mut init: impl FnMut(usize) -> T) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_SLOT_COUNT;

        Self {
            slots: std::array::from_fn(|i| Slot::new(init(i))),
            global_version: AtomicU64::new(NULL_VERSION),
        }
    }

    /// Acquires shared access to the newest published value.
    ///
    /// Returns `None` if nothing has been published yet, or if every published
    /// slot is currently retired by a writer.
    #[must_use]
    pub fn read(&self) -> Option<ReadHandle<'_, T, N>> {
        loop {
            let slot = self.find_latest_readable()?;
            if self.slots[slot].try_join() {
                return Some(ReadHandle { cache: self, slot });
            }
            // A writer retired the slot between the scan and the join.
        }
    }

    /// Claims the oldest unread slot for writing.
    ///
    /// Returns `None` when every slot is being read or written, or when
    /// another writer wins the claim. There is no retry: callers that need
    /// the write to land must try again themselves.
    #[must_use]
    pub fn write_handle(&self) -> Option<WriteHandle<'_, T, N>> {
        let slot = self.find_writable_slot()?;
        let state = &self.slots[slot].state;

        let current = state.load(Ordering::Acquire);
        if current & (WRITING | READERS_MASK) != 0 {
            return None;
        }
        state
            .compare_exchange(current, WRITING, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(WriteHandle { cache: self, slot })
    }

    /// Writes `value` into a free slot and publishes it.
    ///
    /// Returns `false` if no slot could be claimed.
    pub fn write(&self, value: T) -> bool {
        match self.write_handle() {
            Some(mut handle) => {
                *handle = value;
                true
            }
            None => false,
        }
    }

    /// Returns a clone of the newest published value.
    #[must_use]
    pub fn read_value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.read().map(|handle| (*handle).clone())
    }

    /// Returns the most recently assigned version (0 if never written).
    #[inline]
    #[must_use]
    pub fn latest_version(&self) -> u64 {
        self.global_version.load(Ordering::Acquire)
    }

    /// Returns the version stored in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= N`.
    #[inline]
    #[must_use]
    pub fn slot_version(&self, slot: usize) -> u64 {
        self.slots[slot].version.load(Ordering::Acquire)
    }

    /// Returns the number of active readers on `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= N`.
    #[inline]
    #[must_use]
    pub fn reader_count(&self, slot: usize) -> u32 {
        self.slots[slot].state.load(Ordering::Acquire) & READERS_MASK
    }

    /// Returns whether `slot` is claimed by a writer.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= N`.
    #[inline]
    #[must_use]
    pub fn is_writing(&self, slot: usize) -> bool {
        self.slots[slot].state.load(Ordering::Acquire) & WRITING != 0
    }

    /// Returns whether `slot` holds a published value.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= N`.
    #[inline]
    #[must_use]
    pub fn is_readable(&self, slot: usize) -> bool {
        self.slots[slot].state.load(Ordering::Acquire) & READABLE != 0
    }

    /// Newest readable slot. Ties go to the last slot seen.
    fn find_latest_readable(&self) -> Option<usize> {
        let mut best_version = NULL_VERSION;
        let mut best_slot = None;

        for (i, slot) in self.slots.iter().enumerate() {
            if slot.state.load(Ordering::Acquire) & READABLE != 0 {
                let version = slot.version.load(Ordering::Acquire);
                if version >= best_version {
                    best_version = version;
                    best_slot = Some(i);
                }
            }
        }
        best_slot
    }

    /// Oldest slot that is neither written nor read. Ties go to the first slot seen.
    fn find_writable_slot(&self) -> Option<usize> {
        let mut min_version = u64::MAX;
        let mut min_slot = None;

        for (i, slot) in self.slots.iter().enumerate() {
            let state = slot.state.load(Ordering::Acquire);
            if state & (WRITING | READERS_MASK) == 0 {
                let version = slot.version.load(Ordering::Relaxed);
                if version < min_version {
                    min_version = version;
                    min_slot = Some(i);
                }
            }
        }
        min_slot
    }

    /// Assigns a fresh version to `slot` and makes it readable again.
    fn publish(&self, slot: usize) {
        let version = self.global_version.fetch_add(1, Ordering::AcqRel) + 1;
        let slot = &self.slots[slot];
        slot.version.store(version, Ordering::Release);
        // Clears WRITING. No reader can have joined while WRITING was set.
        slot.state.store(READABLE, Ordering::Release);
    }
}

impl<T, const N: usize> fmt::Debug for VersionedCache<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for i in 0..N {
            list.entry(&format_args!(
                "v{} r{} w{} readers={}",
                self.slot_version(i),
                u8::from(self.is_readable(i)),
                u8::from(self.is_writing(i)),
                self.reader_count(i),
            ));
        }
        list.finish()
    }
}

// SAFETY: slots hand out `&mut T` to one thread at a time, which needs `T: Send`.
unsafe impl<T: Send, const N: usize> Send for VersionedCache<T, N> {}
// SAFETY: readers share `&T` across threads (`T: Sync`), writers move exclusive
// access between threads (`T: Send`). The slot state machine rules out overlap.
unsafe impl<T: Send + Sync, const N: usize> Sync for VersionedCache<T, N> {}

/// Shared access to one published slot.
///
/// The slot cannot be claimed by a writer while this handle is alive.
pub struct ReadHandle<'a, T, const N: usize> {
    cache: &'a VersionedCache<T, N>,
    slot: usize,
}

impl<T, const N: usize> ReadHandle<'_, T, N> {
    /// Returns the slot index this handle reads from (for debugging).
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the version of the value being read.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.cache.slot_version(self.slot)
    }
}

impl<T, const N: usize> Deref for ReadHandle<'_, T, N> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: we are a registered reader, so no writer can claim the slot.
        unsafe { &*self.cache.slots[self.slot].value.get() }
    }
}

impl<T, const N: usize> Drop for ReadHandle<'_, T, N> {
    fn drop(&mut self) {
        self.cache.slots[self.slot].leave();
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for ReadHandle<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("slot", &self.slot)
            .field("version", &self.version())
            .field("value", &**self)
            .finish()
    }
}

/// Exclusive access to one retired slot.
///
/// Dropping the handle publishes the slot, whether or not it was modified.
/// A handle that is dropped untouched therefore republishes whatever the slot
/// held before, under a new version.
pub struct WriteHandle<'a, T, const N: usize> {
    cache: &'a VersionedCache<T, N>,
    slot: usize,
}

impl<T, const N: usize> WriteHandle<'_, T, N> {
    /// Returns the slot index this handle writes to (for debugging).
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Publishes the slot now instead of at the end of the scope.
    pub fn commit(self) {
        drop(self);
    }
}

impl<T, const N: usize> Deref for WriteHandle<'_, T, N> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the WRITING bit gives this handle exclusive access.
        unsafe { &*self.cache.slots[self.slot].value.get() }
    }
}

impl<T, const N: usize> DerefMut for WriteHandle<'_, T, N> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the WRITING bit gives this handle exclusive access.
        unsafe { &mut *self.cache.slots[self.slot].value.get() }
    }
}

impl<T, const N: usize> Drop for WriteHandle<'_, T, N> {
    fn drop(&mut self) {
        self.cache.publish(self.slot);
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for WriteHandle<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("slot", &self.slot)
            .field("value", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_creation() {
        let cache: VersionedCache<u32, 3> = VersionedCache::new();
        assert_eq!(cache.latest_version(), 0);
        for slot in 0..3 {
            assert_eq!(cache.slot_version(slot), 0);
            assert!(!cache.is_readable(slot));
            assert!(!cache.is_writing(slot));
            assert_eq!(cache.reader_count(slot), 0);
        }
        assert!(cache.read().is_none());
    }

    #[test]
    fn test_sequential_writes_read_latest() {
        let cache: VersionedCache<u64, 2> = VersionedCache::new();

        for value in 1..=50 {
            assert!(cache.write(value));
            let read = cache.read().unwrap();
            assert_eq!(*read, value);
            assert_eq!(read.version(), value);
        }
    }

    #[test]
    fn test_writer_alternates_slots() {
        let cache: VersionedCache<u32, 2> = VersionedCache::new();

        let first = cache.write_handle().unwrap();
        assert_eq!(first.slot(), 0);
        drop(first);

        let second = cache.write_handle().unwrap();
        assert_eq!(second.slot(), 1);
        drop(second);

        // Slot 0 now holds the oldest version.
        let third = cache.write_handle().unwrap();
        assert_eq!(third.slot(), 0);
    }

    #[test]
    fn test_claim_retires_slot() {
        let cache: VersionedCache<u32, 1> = VersionedCache::new();
        assert!(cache.write(5));
        assert!(cache.is_readable(0));

        let mut handle = cache.write_handle().unwrap();
        assert!(cache.is_writing(0));
        assert!(!cache.is_readable(0));
        assert!(cache.read().is_none());

        *handle = 6;
        drop(handle);

        assert!(!cache.is_writing(0));
        assert_eq!(*cache.read().unwrap(), 6);
    }

    #[test]
    fn test_untouched_write_handle_republishes_stale_slot() {
        let cache: VersionedCache<u32, 2> = VersionedCache::new();
        assert!(cache.write(1)); // slot 0, v1
        assert!(cache.write(2)); // slot 1, v2

        // Claims slot 0 (oldest) and publishes it without writing.
        let handle = cache.write_handle().unwrap();
        assert_eq!(handle.slot(), 0);
        drop(handle);

        let read = cache.read().unwrap();
        assert_eq!(read.version(), 3);
        assert_eq!(*read, 1);
    }

    #[test]
    fn test_explicit_commit_publishes_once() {
        let cache: VersionedCache<u32, 2> = VersionedCache::new();
        let mut handle = cache.write_handle().unwrap();
        *handle = 42;
        handle.commit();

        assert_eq!(cache.latest_version(), 1);
        assert_eq!(*cache.read().unwrap(), 42);
    }

    #[test]
    fn test_reader_pins_slot() {
        let cache: VersionedCache<u32, 2> = VersionedCache::new();
        assert!(cache.write(1)); // slot 0
        let pinned = cache.read().unwrap();
        assert_eq!(pinned.slot(), 0);
        assert_eq!(cache.reader_count(0), 1);

        // Writers avoid the pinned slot.
        for value in 2..10 {
            let mut handle = cache.write_handle().unwrap();
            assert_eq!(handle.slot(), 1);
            *handle = value;
        }
        assert_eq!(*pinned, 1);
        drop(pinned);
        assert_eq!(cache.reader_count(0), 0);
        assert_eq!(*cache.read().unwrap(), 9);
    }

    #[test]
    fn test_no_writable_slot() {
        let cache: VersionedCache<u32, 2> = VersionedCache::new();
        assert!(cache.write(1)); // slot 0
        let _reader = cache.read().unwrap();
        let _writer = cache.write_handle().unwrap(); // slot 1

        assert!(cache.write_handle().is_none());
        assert!(!cache.write(3));
    }

    #[test]
    fn test_read_falls_back_while_newest_slot_is_rewritten() {
        // Pin slot 0 through a reader that saw it before slot 1 existed.
        let cache: VersionedCache<u32, 2> = VersionedCache::new();
        assert!(cache.write(1)); // slot 0, v1
        let pin = cache.read().unwrap();
        assert!(cache.write(2)); // slot 1, v2

        // Only slot 1 is free, so the writer retires the newest value.
        let _writer = cache.write_handle().unwrap();
        let fallback = cache.read().unwrap();
        assert_eq!(*fallback, 1);
        assert_eq!(fallback.version(), 1);
        drop(pin);
    }

    #[test]
    fn test_multiple_readers_share_slot() {
        let cache: VersionedCache<u32, 2> = VersionedCache::new();
        assert!(cache.write(11));

        let a = cache.read().unwrap();
        let b = cache.read().unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_eq!(cache.reader_count(a.slot()), 2);
    }

    #[test]
    fn test_read_value_clones() {
        let cache: VersionedCache<String, 3> = VersionedCache::new();
        assert_eq!(cache.read_value(), None);
        assert!(cache.write("hello".to_owned()));
        assert_eq!(cache.read_value().as_deref(), Some("hello"));
    }

    #[test]
    fn test_from_fn_initial_contents() {
        let cache: VersionedCache<usize, 4> = VersionedCache::from_fn(|i| i * 10);
        // Untouched handle exposes the initial contents of slot 0.
        drop(cache.write_handle().unwrap());
        assert_eq!(*cache.read().unwrap(), 0);
        assert_eq!(VersionedCache::<usize, 4>::SLOTS, 4);
    }
}
