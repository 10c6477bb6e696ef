use async_trait::async_trait;
use fair_tenant::{
    Clock, ClockError, Config, Job, JobType, JobTypeRegistry, MemoryWindowStore, Routing,
    TenantResolver, ThrottleError, ThrottleMiddleware, ThrottleResult, ThrottleRule, WindowRange,
    WindowStore,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3_600);
const DAY: Duration = Duration::from_secs(86_400);
const START: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
struct TestClock {
    time: Arc<AtomicU64>,
}

impl TestClock {
    fn new(start: u64) -> Self {
        Self {
            time: Arc::new(AtomicU64::new(start)),
        }
    }

    fn advance(&self, by: Duration) {
        self.time.fetch_add(by.as_secs(), Ordering::Relaxed);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Result<u64, ClockError> {
        Ok(self.time.load(Ordering::Relaxed))
    }
}

/// Store that fails while `down` is set and otherwise delegates to memory
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryWindowStore,
    down: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl WindowStore for FlakyStore {
    async fn record_and_count(
        &self,
        key: &str,
        event_id: &str,
        now: u64,
        max_window: Duration,
        ranges: &[WindowRange],
    ) -> ThrottleResult<Vec<u64>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.down.load(Ordering::Relaxed) {
            return Err(ThrottleError::Store("connection refused".to_string()));
        }
        self.inner
            .record_and_count(key, event_id, now, max_window, ranges)
            .await
    }
}

fn throttled_job_type() -> JobType {
    JobType::new("SampleThrottledJob")
        .queue("whatever")
        .with_rules(vec![
            ThrottleRule::new("whatever_semislow", 1).per(DAY),
            ThrottleRule::new("whatever_supaslow", 1).per(HOUR),
        ])
}

fn first_argument_tenant() -> TenantResolver {
    TenantResolver::callback(|_, args| {
        Some(args.first().and_then(Value::as_str).unwrap_or("foo").to_string())
    })
}

struct Harness {
    middleware: ThrottleMiddleware,
    clock: TestClock,
    store: FlakyStore,
    job_type: JobType,
}

impl Harness {
    fn new(job_type: JobType) -> Self {
        let clock = TestClock::new(START);
        let store = FlakyStore::default();
        let mut registry = JobTypeRegistry::new();
        registry.register(job_type.clone());

        let middleware = ThrottleMiddleware::with_clock(
            &Config::default(),
            Arc::new(store.clone()),
            Arc::new(registry),
            Arc::new(clock.clone()),
        )
        .unwrap();

        Self {
            middleware,
            clock,
            store,
            job_type,
        }
    }

    async fn enqueue_for(&self, tenant: &str) -> String {
        let job = self.job_type.job(vec![]).with_tenant(tenant);
        self.middleware.call(job, |job| async move { job.queue }).await.unwrap()
    }

    async fn enqueue_with_args(&self, args: Vec<Value>) -> Job {
        let job = self.job_type.job(args);
        self.middleware.call(job, |job| async move { job }).await.unwrap()
    }
}

#[tokio::test]
async fn test_reroutes_busy_tenant_through_tiered_rules() {
    let harness = Harness::new(throttled_job_type());

    assert_eq!(harness.enqueue_for("foo").await, "whatever");
    assert_eq!(harness.enqueue_for("foo").await, "whatever_supaslow");
    assert_eq!(harness.enqueue_for("bar").await, "whatever");

    harness.clock.advance(HOUR + Duration::from_secs(1));
    assert_eq!(harness.enqueue_for("foo").await, "whatever_semislow");

    harness.clock.advance(DAY + Duration::from_secs(1));
    assert_eq!(harness.enqueue_for("foo").await, "whatever");
}

#[tokio::test]
async fn test_first_reroute_happens_after_threshold() {
    let job_type = JobType::new("ReportJob")
        .queue("reports")
        .with_rules(vec![ThrottleRule::new("reports_slow", 3).per(HOUR)]);
    let harness = Harness::new(job_type);

    for _ in 0..3 {
        assert_eq!(harness.enqueue_for("acme").await, "reports");
    }
    assert_eq!(harness.enqueue_for("acme").await, "reports_slow");
    assert_eq!(harness.enqueue_for("acme").await, "reports_slow");
}

#[tokio::test]
async fn test_count_resets_after_rule_window() {
    let job_type = JobType::new("ReportJob")
        .queue("reports")
        .with_rules(vec![ThrottleRule::new("reports_slow", 1).per(HOUR)]);
    let harness = Harness::new(job_type);

    assert_eq!(harness.enqueue_for("acme").await, "reports");
    assert_eq!(harness.enqueue_for("acme").await, "reports_slow");

    harness.clock.advance(HOUR + Duration::from_secs(1));
    assert_eq!(harness.enqueue_for("acme").await, "reports");
}

#[tokio::test]
async fn test_tenants_have_independent_windows() {
    let harness = Harness::new(throttled_job_type());

    assert_eq!(harness.enqueue_for("foo").await, "whatever");
    assert_eq!(harness.enqueue_for("bar").await, "whatever");
    assert_eq!(harness.enqueue_for("baz").await, "whatever");
    assert_eq!(harness.enqueue_for("foo").await, "whatever_supaslow");
    assert_eq!(harness.enqueue_for("bar").await, "whatever_supaslow");
}

#[tokio::test]
async fn test_queue_override_at_submission_is_left_alone() {
    let harness = Harness::new(throttled_job_type());

    for _ in 0..3 {
        let mut job = harness
            .job_type
            .job(vec![])
            .with_queue("another")
            .with_tenant("foo");
        let routing = harness.middleware.route(&mut job).await.unwrap();

        assert_eq!(
            routing,
            Routing::AlreadyRouted {
                original_queue: "whatever".to_string()
            }
        );
        assert_eq!(job.queue, "another");
    }
    assert_eq!(harness.store.calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_rerouted_job_is_not_rerouted_again() {
    let harness = Harness::new(throttled_job_type());
    harness.enqueue_for("foo").await;

    let mut job = harness.job_type.job(vec![]).with_tenant("foo");
    harness.middleware.route(&mut job).await.unwrap();
    assert_eq!(job.queue, "whatever_supaslow");

    harness.clock.advance(2 * DAY);
    let routing = harness.middleware.route(&mut job).await.unwrap();
    assert!(matches!(routing, Routing::AlreadyRouted { .. }));
    assert_eq!(job.queue, "whatever_supaslow");
    assert_eq!(harness.store.calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_store_failure_fails_submission() {
    let harness = Harness::new(throttled_job_type());
    harness.store.down.store(true, Ordering::Relaxed);

    let handed_off = Arc::new(AtomicBool::new(false));
    let flag = handed_off.clone();
    let job = harness.job_type.job(vec![]).with_tenant("foo");
    let result = harness
        .middleware
        .call(job, |_| async move { flag.store(true, Ordering::Relaxed) })
        .await;

    assert!(matches!(result, Err(ThrottleError::Store(_))));
    assert!(!handed_off.load(Ordering::Relaxed));

    harness.store.down.store(false, Ordering::Relaxed);
    assert_eq!(harness.enqueue_for("foo").await, "whatever");
}

#[tokio::test]
async fn test_tenant_resolved_from_arguments() {
    let harness = Harness::new(throttled_job_type().tenant(first_argument_tenant()));

    let first = harness.enqueue_with_args(vec![]).await;
    assert_eq!(first.queue, "whatever");
    assert_eq!(first.tenant_id.as_deref(), Some("foo"));

    assert_eq!(harness.enqueue_with_args(vec![]).await.queue, "whatever_supaslow");
    assert_eq!(harness.enqueue_with_args(vec![json!("bar")]).await.queue, "whatever");
}

#[tokio::test]
async fn test_tenant_on_job_wins_over_resolver() {
    let harness = Harness::new(throttled_job_type().tenant(first_argument_tenant()));

    let mut job = harness.job_type.job(vec![json!("bar")]).with_tenant("foo");
    harness.middleware.route(&mut job).await.unwrap();
    assert_eq!(job.tenant_id.as_deref(), Some("foo"));
}

#[tokio::test]
async fn test_missing_tenant_passes_through() {
    let harness = Harness::new(throttled_job_type());

    for _ in 0..3 {
        let mut job = harness.job_type.job(vec![json!(42)]);
        let routing = harness.middleware.route(&mut job).await.unwrap();
        assert_eq!(routing, Routing::NoTenant);
        assert_eq!(job.queue, "whatever");
    }
    assert_eq!(harness.store.calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_wrapped_jobs_share_inner_job_type_window() {
    let harness = Harness::new(throttled_job_type().tenant(first_argument_tenant()));

    let mut direct = harness.job_type.job(vec![json!("foo")]);
    harness.middleware.route(&mut direct).await.unwrap();
    assert_eq!(direct.queue, "whatever");

    let mut wrapped = Job::wrapped("JobWrapper", "SampleThrottledJob", "whatever", vec![json!("foo")])
        .with_rules(harness.job_type.rules.clone());
    harness.middleware.route(&mut wrapped).await.unwrap();
    assert_eq!(wrapped.tenant_id.as_deref(), Some("foo"));
    assert_eq!(wrapped.queue, "whatever_supaslow");
}

#[tokio::test]
async fn test_job_types_without_rules_are_untouched() {
    let harness = Harness::new(JobType::new("SamplePlainJob").queue("default"));

    for _ in 0..3 {
        assert_eq!(harness.enqueue_for("foo").await, "default");
    }
    assert_eq!(harness.store.calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_concurrent_submissions_are_all_counted() {
    let job_type = JobType::new("ReportJob")
        .queue("reports")
        .with_rules(vec![ThrottleRule::new("reports_slow", 10)]);
    let harness = Arc::new(Harness::new(job_type));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let harness = harness.clone();
        handles.push(tokio::spawn(async move { harness.enqueue_for("acme").await }));
    }

    let mut slow = 0;
    for handle in handles {
        if handle.await.unwrap() == "reports_slow" {
            slow += 1;
        }
    }

    assert_eq!(slow, 10);
    let key = "fair-tenant:enqueued:ReportJob:queue:reports:tenant:acme";
    assert_eq!(harness.store.inner.entry_count(key, START).unwrap(), 20);
}
