//! Time source used to stamp window entries.

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Abstracts "now" so the middleware can be driven by a manual clock in tests.
///
/// Implementors return whole seconds since the Unix epoch, which is the score
/// resolution used for window entries.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<u64, ClockError>;
}

#[derive(Debug, Clone, Error)]
pub enum ClockError {
    #[error("system time is before the Unix epoch")]
    BeforeEpoch,
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<u64, ClockError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|_| ClockError::BeforeEpoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        let now = SystemClock.now().unwrap();
        assert!(now > 1_577_836_800);
    }
}
