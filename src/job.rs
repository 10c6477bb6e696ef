//! Job descriptors and per-job-type throttling configuration.

use crate::rules::ThrottleRule;
use crate::tenant::TenantResolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// What a submission runs: a job type directly, or a job type carried inside
/// a generic adapter job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobTarget {
    Direct {
        job_type: String,
    },
    Wrapped {
        adapter: String,
        job_type: String,
        arguments: Vec<Value>,
    },
}

/// A single job submission as handed to the underlying queue framework.
///
/// Only `queue` and `tenant_id` are ever changed while routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub target: JobTarget,
    pub queue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ThrottleRule>,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, queue: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target: JobTarget::Direct {
                job_type: job_type.into(),
            },
            queue: queue.into(),
            tenant_id: None,
            rules: Vec::new(),
            args,
        }
    }

    /// Job executed through `adapter`, whose real type and arguments live in
    /// the wrapped payload
    pub fn wrapped(
        adapter: impl Into<String>,
        job_type: impl Into<String>,
        queue: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target: JobTarget::Wrapped {
                adapter: adapter.into(),
                job_type: job_type.into(),
                arguments,
            },
            queue: queue.into(),
            tenant_id: None,
            rules: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Override the queue for this submission only
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant.into());
        self
    }

    pub fn with_rules(mut self, rules: Vec<ThrottleRule>) -> Self {
        self.rules = rules;
        self
    }

    /// The job type doing the work, looking through adapter jobs
    pub fn job_type(&self) -> &str {
        match &self.target {
            JobTarget::Direct { job_type } | JobTarget::Wrapped { job_type, .. } => job_type,
        }
    }

    /// Arguments of the job type doing the work
    pub fn arguments(&self) -> &[Value] {
        match &self.target {
            JobTarget::Direct { .. } => &self.args,
            JobTarget::Wrapped { arguments, .. } => arguments,
        }
    }
}

/// Static definition of a job type: its default queue, throttling rules and
/// tenant resolution.
#[derive(Debug, Clone)]
pub struct JobType {
    pub name: String,
    pub default_queue: Option<String>,
    pub rules: Vec<ThrottleRule>,
    pub tenant: TenantResolver,
}

impl JobType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_queue: None,
            rules: Vec::new(),
            tenant: TenantResolver::default(),
        }
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = Some(queue.into());
        self
    }

    pub fn with_rules(mut self, rules: Vec<ThrottleRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn tenant(mut self, resolver: TenantResolver) -> Self {
        self.tenant = resolver;
        self
    }

    /// Build a submission of this job type on its default queue with its
    /// rules attached
    pub fn job(&self, args: Vec<Value>) -> Job {
        Job::new(&self.name, self.default_queue.as_deref().unwrap_or("default"), args)
            .with_rules(self.rules.clone())
    }
}

/// Job types known to the producer, looked up by name
#[derive(Debug, Clone, Default)]
pub struct JobTypeRegistry {
    job_types: HashMap<String, JobType>,
}

impl JobTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: JobType) -> &mut Self {
        self.job_types.insert(job_type.name.clone(), job_type);
        self
    }

    pub fn get(&self, name: &str) -> Option<&JobType> {
        self.job_types.get(name)
    }

    /// Statically configured queue of a job type, if any
    pub fn default_queue(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|job_type| job_type.default_queue.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobType> {
        self.job_types.values()
    }
}
