//! Sliding window storage
//!
//! A window is an ordered set of `(timestamp, event id)` entries under one
//! key. Backends must apply prune, insert, expiry refresh and range counts as
//! one indivisible unit per key.

pub mod memory;
pub mod redis;

use crate::error::ThrottleResult;
use async_trait::async_trait;
use std::time::Duration;

pub use self::memory::MemoryWindowStore;
pub use self::redis::RedisWindowStore;

/// Inclusive range of timestamps (seconds) to count within a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub start: u64,
    pub end: u64,
}

impl WindowRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Shared store holding per-tenant sliding windows
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record `event_id` at `now` under `key` and count entries per range.
    ///
    /// Atomically drops entries at or before `now - max_window`, inserts the
    /// event (an id already present keeps a single entry), refreshes the key
    /// expiry to `max_window`, then returns one count per `ranges` element in
    /// the same order. The new entry is included in any range covering `now`.
    async fn record_and_count(
        &self,
        key: &str,
        event_id: &str,
        now: u64,
        max_window: Duration,
        ranges: &[WindowRange],
    ) -> ThrottleResult<Vec<u64>>;
}
