//! In-process window store
//!
//! Mirrors the Redis sorted-set semantics for embedders running a single
//! producer process, and for tests.

use super::{WindowRange, WindowStore};
use crate::error::{ThrottleError, ThrottleResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Seconds between sweeps of expired keys
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Entries of one key plus the second at which the whole key expires
#[derive(Debug, Default, Clone)]
struct Window {
    entries: HashMap<String, u64>,
    expires_at: u64,
}

#[derive(Debug, Default)]
struct Windows {
    by_key: HashMap<String, Window>,
    last_sweep: u64,
}

impl Windows {
    fn sweep(&mut self, now: u64) -> usize {
        let initial_count = self.by_key.len();
        self.by_key.retain(|_, window| window.expires_at > now);
        self.last_sweep = now;
        initial_count - self.by_key.len()
    }
}

/// Expired keys are dropped by a sweep that runs inside `record_and_count`
/// at most once per `SWEEP_INTERVAL_SECS`, or on demand via `purge_expired`.
#[derive(Debug, Clone, Default)]
pub struct MemoryWindowStore {
    windows: Arc<Mutex<Windows>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries under `key` at `now`
    pub fn entry_count(&self, key: &str, now: u64) -> ThrottleResult<usize> {
        let windows = self.lock()?;
        Ok(windows
            .by_key
            .get(key)
            .filter(|window| window.expires_at > now)
            .map(|window| window.entries.len())
            .unwrap_or(0))
    }

    /// Drop keys whose expiry has passed, returning how many were removed
    pub fn purge_expired(&self, now: u64) -> ThrottleResult<usize> {
        Ok(self.lock()?.sweep(now))
    }

    /// Number of keys currently held, expired or not
    pub fn key_count(&self) -> ThrottleResult<usize> {
        Ok(self.lock()?.by_key.len())
    }

    fn lock(&self) -> ThrottleResult<std::sync::MutexGuard<'_, Windows>> {
        self.windows
            .lock()
            .map_err(|_| ThrottleError::Store("Failed to acquire window lock".to_string()))
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn record_and_count(
        &self,
        key: &str,
        event_id: &str,
        now: u64,
        max_window: Duration,
        ranges: &[WindowRange],
    ) -> ThrottleResult<Vec<u64>> {
        let max_secs = max_window.as_secs();
        let cutoff = now.saturating_sub(max_secs);

        let mut windows = self.lock()?;
        if now >= windows.last_sweep.saturating_add(SWEEP_INTERVAL_SECS) {
            windows.sweep(now);
        }
        let window = windows.by_key.entry(key.to_string()).or_default();

        if window.expires_at <= now {
            window.entries.clear();
        }

        window.entries.retain(|_, timestamp| *timestamp > cutoff);
        window.entries.insert(event_id.to_string(), now);
        window.expires_at = now.saturating_add(max_secs);

        Ok(ranges
            .iter()
            .map(|range| {
                window
                    .entries
                    .values()
                    .filter(|timestamp| range.contains(**timestamp))
                    .count() as u64
            })
            .collect())
    }
}
