//! Typed configuration for the core.
//!
//! Everything has a sensible default; `from_env` overrides from `RELAY_*`
//! variables. Values are plain data passed into constructors -- there is no
//! process-global configuration state.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::executor::ExecutorConfig;
use crate::resilience::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};

/// All core knobs in one place.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub executor: ExecutorConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit: CircuitBreakerConfig,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

impl CoreConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparseable.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `RELAY_PARALLEL_WORKERS` | `executor.workers` |
    /// | `RELAY_TASK_TIMEOUT_SECS` | `executor.task_timeout` |
    /// | `RELAY_RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
    /// | `RELAY_RETRY_INITIAL_DELAY_MS` | `retry.initial_delay` |
    /// | `RELAY_RETRY_MAX_DELAY_MS` | `retry.max_delay` |
    /// | `RELAY_RETRY_MULTIPLIER` | `retry.multiplier` |
    /// | `RELAY_RETRY_JITTER_FACTOR` | `retry.jitter_factor` |
    /// | `RELAY_RETRY_MAX_DURATION_MS` | `retry.max_total_duration` |
    /// | `RELAY_RATE_LIMIT_CAPACITY` | `rate_limit.capacity` |
    /// | `RELAY_RATE_LIMIT_REFILL_PER_SEC` | `rate_limit.refill_per_sec` |
    /// | `RELAY_CIRCUIT_FAILURE_THRESHOLD` | `circuit.failure_threshold` |
    /// | `RELAY_CIRCUIT_OPEN_DURATION_MS` | `circuit.open_duration` |
    ///
    /// The store's `RELAY_DATABASE_URL` and `RELAY_MEMORY_LIMIT` are read by
    /// [`relay_store::StoreConfig::from_env`].
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(workers) = env_parse("RELAY_PARALLEL_WORKERS") {
            config.executor.workers = workers;
        }
        if let Some(secs) = env_parse::<u64>("RELAY_TASK_TIMEOUT_SECS") {
            config.executor.task_timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = env_parse("RELAY_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = attempts;
        }
        if let Some(delay) = env_millis("RELAY_RETRY_INITIAL_DELAY_MS") {
            config.retry.initial_delay = delay;
        }
        if let Some(delay) = env_millis("RELAY_RETRY_MAX_DELAY_MS") {
            config.retry.max_delay = delay;
        }
        if let Some(multiplier) = env_parse("RELAY_RETRY_MULTIPLIER") {
            config.retry.multiplier = multiplier;
        }
        if let Some(factor) = env_parse("RELAY_RETRY_JITTER_FACTOR") {
            config.retry.jitter_factor = factor;
        }
        if let Some(duration) = env_millis("RELAY_RETRY_MAX_DURATION_MS") {
            config.retry.max_total_duration = duration;
        }

        if let Some(capacity) = env_parse("RELAY_RATE_LIMIT_CAPACITY") {
            config.rate_limit.capacity = capacity;
        }
        if let Some(refill) = env_parse("RELAY_RATE_LIMIT_REFILL_PER_SEC") {
            config.rate_limit.refill_per_sec = refill;
        }

        if let Some(threshold) = env_parse("RELAY_CIRCUIT_FAILURE_THRESHOLD") {
            config.circuit.failure_threshold = threshold;
        }
        if let Some(duration) = env_millis("RELAY_CIRCUIT_OPEN_DURATION_MS") {
            config.circuit.open_duration = duration;
        }

        config
    }
}
