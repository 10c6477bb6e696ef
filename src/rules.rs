use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// A single threshold rule: once a tenant has enqueued more than `threshold`
/// jobs within `per`, its jobs go to `queue`.
///
/// Rules are kept in caller order, loosest first. A rule without `per` counts
/// over the whole max throttling window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ThrottleRule {
    #[validate(length(min = 1, message = "target queue cannot be empty"))]
    pub queue: String,
    pub threshold: u64,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub per: Option<Duration>,
}

impl ThrottleRule {
    /// Create a rule that counts over the default (max) window
    pub fn new(queue: impl Into<String>, threshold: u64) -> Self {
        Self {
            queue: queue.into(),
            threshold,
            per: None,
        }
    }

    /// Restrict the rule to a shorter counting window
    pub fn per(mut self, window: Duration) -> Self {
        self.per = Some(window);
        self
    }

    /// Length of the counting window, falling back to `max_window`.
    ///
    /// A `per` longer than `max_window` is returned as-is, but the store never
    /// keeps entries older than `max_window`, so such a rule undercounts.
    pub fn window(&self, max_window: Duration) -> Duration {
        self.per.unwrap_or(max_window)
    }

    /// First second (inclusive) counted by this rule at `now`
    pub fn window_start(&self, now: u64, max_window: Duration) -> u64 {
        now.saturating_sub(self.window(max_window).as_secs())
    }

    /// A rule matches when the count is strictly above its threshold
    pub fn matches(&self, count: u64) -> bool {
        count > self.threshold
    }
}

/// Pick the queue for a job given per-rule event counts.
///
/// `counts[i]` belongs to `rules[i]`. The last matching rule wins, so callers
/// list rules from loosest to strictest. Without a match the original queue is
/// kept.
pub fn assign_queue<'a>(rules: &'a [ThrottleRule], counts: &[u64], original_queue: &'a str) -> &'a str {
    rules
        .iter()
        .zip(counts)
        .rev()
        .find(|(rule, count)| rule.matches(**count))
        .map(|(rule, _)| rule.queue.as_str())
        .unwrap_or(original_queue)
}
