//! Producer-side middleware that reroutes jobs of overly active tenants to
//! slower queues.
//!
//! Each submission is recorded in its tenant's sliding window, the window is
//! counted once per rule, and the last matching rule picks the queue. The
//! middleware keeps no state of its own between calls; the window store is the
//! only shared resource and provides per-key atomicity.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::ThrottleResult;
use crate::job::{Job, JobTypeRegistry};
use crate::key_generator::KeyGenerator;
use crate::rules::{assign_queue, ThrottleRule};
use crate::store::{WindowRange, WindowStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;

/// Outcome of routing one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// No throttling rules for this job type
    Disabled,
    /// The queue already differs from the job type's original queue, either
    /// from an earlier pass or an explicit override at submission time
    AlreadyRouted { original_queue: String },
    /// No tenant could be determined, so the job was not counted
    NoTenant,
    /// The submission was counted and assigned `queue`
    Assigned { queue: String, rerouted: bool },
}

/// Routes job submissions, moving busy tenants' jobs to slower queues.
///
/// Cheap to clone and safe to share across producer tasks.
#[derive(Clone)]
pub struct ThrottleMiddleware {
    store: Arc<dyn WindowStore>,
    registry: Arc<JobTypeRegistry>,
    clock: Arc<dyn Clock>,
    keys: KeyGenerator,
    max_window: Duration,
}

impl ThrottleMiddleware {
    /// Create a middleware using the system clock
    pub fn new(
        config: &Config,
        store: Arc<dyn WindowStore>,
        registry: Arc<JobTypeRegistry>,
    ) -> ThrottleResult<Self> {
        Self::with_clock(config, store, registry, Arc::new(SystemClock))
    }

    /// Create a middleware with an explicit time source.
    ///
    /// Only the window length and key template are checked; store settings
    /// such as the Redis URL belong to whoever builds the store.
    pub fn with_clock(
        config: &Config,
        store: Arc<dyn WindowStore>,
        registry: Arc<JobTypeRegistry>,
        clock: Arc<dyn Clock>,
    ) -> ThrottleResult<Self> {
        config.validate()?;

        Ok(Self {
            store,
            registry,
            clock,
            keys: config.key_generator()?,
            max_window: config.max_throttling_window(),
        })
    }

    /// Longest span of history kept per window
    pub fn max_window(&self) -> Duration {
        self.max_window
    }

    /// Route `job`, then hand it to `next` (the queue framework's enqueue).
    ///
    /// Store failures are returned and `next` is not called.
    pub async fn call<F, Fut, T>(&self, mut job: Job, next: F) -> ThrottleResult<T>
    where
        F: FnOnce(Job) -> Fut,
        Fut: Future<Output = T>,
    {
        self.route(&mut job).await?;
        Ok(next(job).await)
    }

    /// Decide the queue of `job`, updating `job.queue` and `job.tenant_id`
    pub async fn route(&self, job: &mut Job) -> ThrottleResult<Routing> {
        let job_type = job.job_type().to_string();
        let definition = self.registry.get(&job_type);

        let rules: &[ThrottleRule] = if !job.rules.is_empty() {
            &job.rules
        } else {
            definition.map(|d| d.rules.as_slice()).unwrap_or(&[])
        };
        if rules.is_empty() {
            return Ok(Routing::Disabled);
        }

        let original_queue = self
            .registry
            .default_queue(&job_type)
            .unwrap_or(job.queue.as_str())
            .to_string();
        if job.queue != original_queue {
            debug!(
                target: "fair_tenant::middleware",
                job_type = %job_type,
                queue = %job.queue,
                original_queue = %original_queue,
                "Queue already assigned, skipping"
            );
            return Ok(Routing::AlreadyRouted { original_queue });
        }

        let tenant = match job.tenant_id.as_deref().filter(|t| !t.is_empty()) {
            Some(tenant) => Some(tenant.to_string()),
            None => definition.and_then(|d| d.tenant.resolve(&job_type, job.arguments())),
        };
        let Some(tenant) = tenant else {
            warn!(
                target: "fair_tenant::middleware",
                job_type = %job_type,
                args = ?job.arguments(),
                "Job won't be throttled: missing tenant"
            );
            return Ok(Routing::NoTenant);
        };
        job.tenant_id = Some(tenant.clone());

        let now = self.clock.now()?;
        let ranges: Vec<WindowRange> = rules
            .iter()
            .map(|rule| WindowRange::new(rule.window_start(now, self.max_window), now))
            .collect();

        let key = self.keys.generate_key(&job_type, &original_queue, &tenant);
        let event_id = format!("jid:{}", job.id);
        let counts = self
            .store
            .record_and_count(&key, &event_id, now, self.max_window, &ranges)
            .await?;

        let queue = assign_queue(rules, &counts, &original_queue).to_string();
        let rerouted = queue != original_queue;

        if rerouted {
            info!(
                target: "fair_tenant::middleware",
                job_type = %job_type,
                tenant = %tenant,
                from = %original_queue,
                to = %queue,
                counts = ?counts,
                "Rerouting job of busy tenant"
            );
        } else {
            debug!(
                target: "fair_tenant::middleware",
                job_type = %job_type,
                tenant = %tenant,
                queue = %queue,
                counts = ?counts,
                "Job kept on original queue"
            );
        }

        job.queue = queue.clone();
        Ok(Routing::Assigned { queue, rerouted })
    }
}

impl std::fmt::Debug for ThrottleMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleMiddleware")
            .field("keys", &self.keys)
            .field("max_window", &self.max_window)
            .field("job_types", &self.registry.iter().count())
            .finish()
    }
}
