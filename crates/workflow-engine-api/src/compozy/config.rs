//! Configuration envelope (§6.5): redis host, postgres DSN, durable-host
//! address/namespace/task-queue, CORS, body-size limit, rate-limit.
//!
//! Loaded from environment variables (optionally via a `.env` file through
//! `dotenvy`, loaded once at the binary entrypoint — never here), the same
//! pattern `workflow-engine-app`'s `AppConfig` uses. No globals: callers hold
//! a `CompozyConfig` and pass it down explicitly.

use std::env;
use std::time::Duration;

/// Configuration errors. No silent defaults for secrets: a missing
/// `DATABASE_URL` or `REDIS_URL` is always a hard error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var_name}")]
    MissingEnvVar { var_name: String },

    #[error("Invalid environment variable value for {var_name}: {value}")]
    InvalidEnvVar { var_name: String, value: String },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct CompozyConfig {
    pub redis_host: String,
    pub postgres_dsn: String,
    pub durable_host_address: String,
    pub durable_host_namespace: String,
    pub task_queue: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_body_size_bytes: usize,
    pub rate_limit_per_minute: u32,
    pub activity_start_to_close: Duration,
}

impl CompozyConfig {
    /// Reads every field from the environment. Secrets (`DATABASE_URL`,
    /// `REDIS_URL`) have no default and error when absent; everything else
    /// falls back to the defaults named in §6.5.
    pub fn from_env() -> Result<Self, ConfigError> {
        let postgres_dsn = require_env("DATABASE_URL")?;
        let redis_host = require_env("REDIS_URL")?;

        let durable_host_address =
            env::var("COMPOZY_DURABLE_HOST_ADDRESS").unwrap_or_else(|_| "localhost:7233".to_string());
        let durable_host_namespace =
            env::var("COMPOZY_DURABLE_HOST_NAMESPACE").unwrap_or_else(|_| "default".to_string());
        let task_queue =
            env::var("COMPOZY_TASK_QUEUE").unwrap_or_else(|_| "compozy-task-queue".to_string());

        let cors_allowed_origins = env::var("COMPOZY_CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let max_body_size_bytes = parse_env_var("COMPOZY_MAX_BODY_SIZE_BYTES", 2 * 1024 * 1024)?;
        let rate_limit_per_minute = parse_env_var("COMPOZY_RATE_LIMIT_PER_MINUTE", 60)?;
        let activity_start_to_close_secs = parse_env_var("COMPOZY_ACTIVITY_START_TO_CLOSE_SECS", 30 * 60)?;

        Ok(Self {
            redis_host,
            postgres_dsn,
            durable_host_address,
            durable_host_namespace,
            task_queue,
            cors_allowed_origins,
            max_body_size_bytes,
            rate_limit_per_minute,
            activity_start_to_close: Duration::from_secs(activity_start_to_close_secs as u64),
        })
    }
}

fn require_env(var_name: &str) -> Result<String, ConfigError> {
    env::var(var_name).map_err(|_| ConfigError::MissingEnvVar { var_name: var_name.to_string() })
}

fn parse_env_var(var_name: &str, default_value: u32) -> Result<u32, ConfigError> {
    let value_str = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
    value_str.parse().map_err(|_| ConfigError::InvalidEnvVar { var_name: var_name.to_string(), value: value_str })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_url_is_an_error() {
        env::remove_var("DATABASE_URL_TEST_PROBE_COMPOZY");
        let result = require_env("DATABASE_URL_TEST_PROBE_COMPOZY");
        assert!(matches!(result, Err(ConfigError::MissingEnvVar { .. })));
    }

    #[test]
    fn parse_env_var_falls_back_to_default_when_unset() {
        let var = "COMPOZY_TEST_PARSE_DEFAULT";
        env::remove_var(var);
        assert_eq!(parse_env_var(var, 42).unwrap(), 42);
    }

    #[test]
    fn parse_env_var_rejects_non_numeric_values() {
        let var = "COMPOZY_TEST_PARSE_INVALID";
        env::set_var(var, "not-a-number");
        let result = parse_env_var(var, 42);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
        env::remove_var(var);
    }

    #[test]
    fn cors_origins_split_and_trim_on_commas() {
        let raw = "https://a.example, https://b.example ,";
        let origins: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }
}
