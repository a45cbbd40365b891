//! # Thread Routes
//!
//! A route tells the scheduler where a ready task runs.
//!
//! ```text
//!   bits 9..32    bit 8         bits 0..8
//! ┌───────────┬─────────────┬──────────────────────────────┐
//! │  unused   │ LOCAL_QUEUE │ thread index (0..=4) or 0xFF │
//! └───────────┴─────────────┴──────────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Threads with a fixed role, each owning a local and a main queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NamedThread {
    /// Game logic thread.
    Game = 0,
    /// Render command thread.
    Render = 1,
    /// Render hardware interface thread.
    Rhi = 2,
    /// Audio thread.
    Audio = 3,
    /// Statistics thread.
    Stats = 4,
}

impl NamedThread {
    /// Number of named threads.
    pub const COUNT: usize = 5;

    /// All named threads in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Game,
        Self::Render,
        Self::Rhi,
        Self::Audio,
        Self::Stats,
    ];

    /// Returns the thread index (0..=4).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up a named thread by index.
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short lowercase name, also used as the OS thread name suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Render => "render",
            Self::Rhi => "rhi",
            Self::Audio => "audio",
            Self::Stats => "stats",
        }
    }
}

impl fmt::Display for NamedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded destination of a ready task.
///
/// # Example
///
/// ```rust
/// use tessera_tasks::{NamedThread, ThreadRoute};
///
/// let route = ThreadRoute::named(NamedThread::Render).local();
/// assert_eq!(route.named_thread(), Some(NamedThread::Render));
/// assert!(route.is_local_queue());
/// assert!(ThreadRoute::ANY.is_any_thread());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ThreadRoute(u32);

impl ThreadRoute {
    /// Thread index meaning "any worker".
    pub const ANY_THREAD_INDEX: u32 = 0xFF;
    /// Selects the local queue of a named thread.
    pub const LOCAL_QUEUE: u32 = 0x100;
    const INDEX_MASK: u32 = 0xFF;

    /// Any worker of the pool.
    pub const ANY: Self = Self(Self::ANY_THREAD_INDEX);

    /// Main queue of `thread`.
    #[inline]
    #[must_use]
    pub const fn named(thread: NamedThread) -> Self {
        Self(thread as u32)
    }

    /// Wraps raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Same thread, local queue.
    #[inline]
    #[must_use]
    pub const fn local(self) -> Self {
        Self(self.0 | Self::LOCAL_QUEUE)
    }

    /// Same thread, main queue.
    #[inline]
    #[must_use]
    pub const fn main(self) -> Self {
        Self(self.0 & !Self::LOCAL_QUEUE)
    }

    /// Returns the low-byte thread index.
    #[inline]
    #[must_use]
    pub const fn thread_index(self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    /// Checks whether the local-queue bit is set.
    #[inline]
    #[must_use]
    pub const fn is_local_queue(self) -> bool {
        self.0 & Self::LOCAL_QUEUE != 0
    }

    /// Checks whether this route targets the worker pool.
    #[inline]
    #[must_use]
    pub const fn is_any_thread(self) -> bool {
        self.thread_index() == Self::ANY_THREAD_INDEX
    }

    /// Returns the named thread, or `None` for the pool and unknown indices.
    #[inline]
    #[must_use]
    pub fn named_thread(self) -> Option<NamedThread> {
        NamedThread::from_index(self.thread_index() as usize)
    }
}

impl Default for ThreadRoute {
    fn default() -> Self {
        Self::ANY
    }
}

impl From<NamedThread> for ThreadRoute {
    fn from(thread: NamedThread) -> Self {
        Self::named(thread)
    }
}

impl fmt::Display for ThreadRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = if self.is_local_queue() { "local" } else { "main" };
        match self.named_thread() {
            Some(thread) => write!(f, "{thread}/{queue}"),
            None if self.is_any_thread() => f.write_str("any"),
            None => write!(f, "unknown({:#x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_bits() {
        assert_eq!(ThreadRoute::named(NamedThread::Game).bits(), 0);
        assert_eq!(ThreadRoute::named(NamedThread::Stats).local().bits(), 0x104);
        assert_eq!(ThreadRoute::ANY.bits(), 0xFF);
        assert_eq!(ThreadRoute::ANY.local().bits(), 0x1FF);
    }

    #[test]
    fn test_local_and_main_toggle() {
        let route = ThreadRoute::named(NamedThread::Audio).local();
        assert!(route.is_local_queue());
        assert!(!route.main().is_local_queue());
        assert_eq!(route.main().named_thread(), Some(NamedThread::Audio));
    }

    #[test]
    fn test_unknown_index() {
        let route = ThreadRoute::from_bits(0x07);
        assert_eq!(route.named_thread(), None);
        assert!(!route.is_any_thread());
        assert_eq!(route.to_string(), "unknown(0x7)");
    }

    #[test]
    fn test_display() {
        assert_eq!(ThreadRoute::named(NamedThread::Rhi).to_string(), "rhi/main");
        assert_eq!(ThreadRoute::named(NamedThread::Rhi).local().to_string(), "rhi/local");
        assert_eq!(ThreadRoute::ANY.to_string(), "any");
    }
}
