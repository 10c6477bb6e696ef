use crate::config::Config;
use crate::error::ThrottleError;
use crate::job::JobTypeRegistry;
use crate::rules::ThrottleRule;
use validator::Validate;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), ThrottleError> {
        if url.is_empty() {
            return Err(ThrottleError::Validation(
                "Redis URL cannot be empty".to_string(),
            ));
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") && !url.starts_with("unix://") {
            return Err(ThrottleError::Validation(
                "Redis URL must start with 'redis://', 'rediss://' or 'unix://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates process-wide settings
    pub fn validate_config(config: &Config) -> Result<(), ThrottleError> {
        config.validate()?;
        Self::validate_redis_url(&config.redis_url)
    }

    /// Validates an ordered rule set.
    ///
    /// Rules whose `per` exceeds the max throttling window are accepted: they
    /// undercount, which is left to the operator.
    pub fn validate_rules(rules: &[ThrottleRule]) -> Result<(), ThrottleError> {
        for (index, rule) in rules.iter().enumerate() {
            rule.validate().map_err(|e| {
                ThrottleError::Validation(format!("Rule #{} ({}): {}", index, rule.queue, e))
            })?;

            if rule.per.is_some_and(|per| per.as_secs() == 0) {
                return Err(ThrottleError::Validation(format!(
                    "Rule #{} ({}): window must be at least one second",
                    index, rule.queue
                )));
            }
        }

        Ok(())
    }

    /// Validates the rules of every registered job type
    pub fn validate_registry(registry: &JobTypeRegistry) -> Result<(), ThrottleError> {
        for job_type in registry.iter() {
            Self::validate_rules(&job_type.rules)
                .map_err(|e| ThrottleError::Validation(format!("{}: {}", job_type.name, e)))?;
        }

        Ok(())
    }
}
