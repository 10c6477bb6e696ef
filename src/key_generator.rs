//! Store key generation for tenant windows.

use crate::error::ThrottleError;
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_ENQUEUES_KEY: &str = "fair-tenant:enqueued:{job_type}:queue:{queue}:tenant:{tenant}";

const PLACEHOLDERS: [&str; 3] = ["job_type", "queue", "tenant"];

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"))
}

/// Renders window keys from a template such as
/// `fair-tenant:enqueued:{job_type}:queue:{queue}:tenant:{tenant}`.
///
/// The rendered key must stay stable across restarts so windows survive them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenerator {
    template: String,
}

impl KeyGenerator {
    /// Build a generator, rejecting templates with unknown placeholders or
    /// without `{tenant}`
    pub fn new(template: impl Into<String>) -> Result<Self, ThrottleError> {
        let template = template.into();
        Self::validate_template(&template)?;
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Key of the window shared by one tenant, job type and original queue
    pub fn generate_key(&self, job_type: &str, queue: &str, tenant: &str) -> String {
        placeholder_pattern()
            .replace_all(&self.template, |caps: &regex::Captures<'_>| match &caps[1] {
                "job_type" => job_type.to_string(),
                "queue" => queue.to_string(),
                _ => tenant.to_string(),
            })
            .into_owned()
    }

    pub fn validate_template(template: &str) -> Result<(), ThrottleError> {
        if template.trim().is_empty() {
            return Err(ThrottleError::Configuration(
                "Enqueues key template cannot be empty".to_string(),
            ));
        }

        let mut has_tenant = false;
        for caps in placeholder_pattern().captures_iter(template) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(ThrottleError::Configuration(format!(
                    "Unknown placeholder '{{{}}}' in enqueues key template. Must be one of: {:?}",
                    name, PLACEHOLDERS
                )));
            }
            has_tenant |= name == "tenant";
        }

        if !has_tenant {
            return Err(ThrottleError::Configuration(
                "Enqueues key template must contain '{tenant}'".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            template: DEFAULT_ENQUEUES_KEY.to_string(),
        }
    }
}
