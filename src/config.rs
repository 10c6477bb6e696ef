use crate::error::ThrottleError;
use crate::key_generator::{KeyGenerator, DEFAULT_ENQUEUES_KEY};
use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default max throttling window: one day
pub const DEFAULT_MAX_THROTTLING_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, Envconfig, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Redis connection URL
    #[envconfig(from = "FAIR_TENANT_REDIS_URL", default = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Longest span of enqueue history kept per tenant, in seconds
    #[envconfig(from = "FAIR_TENANT_MAX_THROTTLING_WINDOW", default = "86400")]
    #[validate(range(min = 1, message = "max throttling window must be at least one second"))]
    pub max_throttling_window_secs: u64,

    /// Template for the sorted set holding a tenant's recent enqueues
    #[envconfig(
        from = "FAIR_TENANT_ENQUEUES_KEY",
        default = "fair-tenant:enqueued:{job_type}:queue:{queue}:tenant:{tenant}"
    )]
    #[validate(custom(function = "validate_enqueues_key"))]
    pub enqueues_key: String,

    /// Log level used when RUST_LOG is unset
    #[envconfig(from = "FAIR_TENANT_LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn max_throttling_window(&self) -> Duration {
        Duration::from_secs(self.max_throttling_window_secs)
    }

    pub fn key_generator(&self) -> Result<KeyGenerator, ThrottleError> {
        KeyGenerator::new(self.enqueues_key.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_throttling_window_secs: DEFAULT_MAX_THROTTLING_WINDOW_SECS,
            enqueues_key: DEFAULT_ENQUEUES_KEY.to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn validate_enqueues_key(template: &str) -> Result<(), ValidationError> {
    KeyGenerator::validate_template(template).map_err(|e| {
        let mut error = ValidationError::new("enqueues_key");
        error.message = Some(e.to_string().into());
        error
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_throttling_window(), Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
        assert_eq!(config.key_generator().unwrap(), KeyGenerator::default());
    }

    #[test]
    fn test_env_defaults_match_default() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        let default = Config::default();
        assert_eq!(config.redis_url, default.redis_url);
        assert_eq!(config.max_throttling_window_secs, default.max_throttling_window_secs);
        assert_eq!(config.enqueues_key, default.enqueues_key);
    }

    #[test]
    fn test_env_overrides() {
        let mut env = HashMap::new();
        env.insert("FAIR_TENANT_MAX_THROTTLING_WINDOW".to_string(), "3600".to_string());
        env.insert(
            "FAIR_TENANT_ENQUEUES_KEY".to_string(),
            "enqueued:{job_type}:tenant:{tenant}".to_string(),
        );

        let config = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(config.max_throttling_window(), Duration::from_secs(3_600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let config = Config {
            max_throttling_window_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            enqueues_key: "enqueued:{job_type}".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
