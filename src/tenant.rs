use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type ResolveFn = dyn Fn(&str, &[Value]) -> Option<String> + Send + Sync;

/// How a job type obtains the tenant a submission belongs to.
#[derive(Clone, Default)]
pub enum TenantResolver {
    /// The producer attaches the tenant to the job before submission
    #[default]
    OnJob,
    /// Computed from the job type and its arguments
    Callback(Arc<ResolveFn>),
}

impl TenantResolver {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Option<String> + Send + Sync + 'static,
    {
        TenantResolver::Callback(Arc::new(f))
    }

    /// Resolve the tenant of a job that does not carry one yet
    pub fn resolve(&self, job_type: &str, arguments: &[Value]) -> Option<String> {
        match self {
            TenantResolver::OnJob => None,
            TenantResolver::Callback(f) => f(job_type, arguments).filter(|tenant| !tenant.is_empty()),
        }
    }
}

impl fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantResolver::OnJob => write!(f, "OnJob"),
            TenantResolver::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}
