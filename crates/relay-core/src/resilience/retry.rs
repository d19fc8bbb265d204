//! Bounded retry with exponential backoff and jitter.
//!
//! The provider layer is the only retry loop in the system: the executor
//! never re-runs a failed task, it fails the workflow and leaves resume to
//! the caller.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::provider::classifier::Classifier;
use crate::provider::error::LmError;

/// Exponential-backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on a single computed delay.
    pub max_delay: Duration,
    /// Factor applied per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay (0.0 disables it).
    pub jitter_factor: f64,
    /// Budget across all attempts; no retry is scheduled past it.
    pub max_total_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.2,
            max_total_duration: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before retry number `retry` (0-based), jittered.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(retry as i32);
        let capped = Duration::from_millis(base as u64).min(self.max_delay);
        self.jittered(capped)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rand::rng().random_range(-range..=range);
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

/// A final failure after the retry loop gave up.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RetryError {
    pub error: LmError,
    /// Attempts actually made before giving up.
    pub attempts: u32,
}

/// Runs an operation under a [`RetryConfig`], retrying only errors the
/// classifier marks transient.
pub struct RetryExecutor {
    config: RetryConfig,
    classifier: Classifier,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, classifier: Classifier) -> Self {
        Self { config, classifier }
    }

    /// Call `operation` until it succeeds, a permanent error surfaces, or
    /// the attempt/duration budget runs out. The closure receives the
    /// 1-based attempt number.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LmError>>,
    {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !(self.classifier)(&error) {
                        return Err(RetryError { error, attempts: attempt });
                    }
                    if attempt >= max_attempts {
                        warn!(attempt, error = %error, "retries exhausted");
                        return Err(RetryError { error, attempts: attempt });
                    }

                    let mut delay = self.config.delay_for(attempt - 1);
                    // Honor a server-provided hint when it asks for more
                    // patience than the computed backoff.
                    if let LmError::RateLimitExceeded {
                        retry_after: Some(hint),
                        ..
                    } = &error
                    {
                        delay = delay.max(*hint);
                    }

                    if started.elapsed() + delay > self.config.max_total_duration {
                        warn!(attempt, "retry duration budget exhausted");
                        return Err(RetryError { error, attempts: attempt });
                    }

                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::provider::classifier::default_classifier;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_total_duration: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let executor = RetryExecutor::new(fast_config(3), default_classifier());
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(LmError::NetworkError("connection reset".into()))
                    } else {
                        Ok("done".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let executor = RetryExecutor::new(fast_config(5), default_classifier());
        let calls = AtomicU32::new(0);

        let result: Result<String, _> = executor
            .execute(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LmError::AuthFailed("bad key".into())) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.error, LmError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn exhausts_attempts_on_persistent_transient_error() {
        let executor = RetryExecutor::new(fast_config(3), default_classifier());
        let calls = AtomicU32::new(0);

        let result: Result<String, _> = executor
            .execute(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LmError::ServiceUnavailable("503".into())) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
    }

    #[tokio::test]
    async fn respects_total_duration_budget() {
        let config = RetryConfig {
            max_attempts: 100,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_total_duration: Duration::from_millis(10),
        };
        let executor = RetryExecutor::new(config, default_classifier());
        let calls = AtomicU32::new(0);

        let result: Result<String, _> = executor
            .execute(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LmError::Timeout("slow".into())) }
            })
            .await;

        assert!(result.is_err());
        // The first retry's 50ms delay would blow the 10ms budget.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn honors_retry_after_hint() {
        let config = fast_config(2);
        let executor = RetryExecutor::new(config, default_classifier());
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = executor
            .execute(|_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(LmError::RateLimitExceeded {
                            message: "slow down".into(),
                            retry_after: Some(Duration::from_millis(40)),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        let d0 = config.delay_for(0);
        let d1 = config.delay_for(1);
        let d2 = config.delay_for(2);
        assert!(d0 < d1 && d1 < d2);
        assert!(config.delay_for(30) <= config.max_delay);
    }

    #[test]
    fn jitter_stays_within_factor() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1000),
            multiplier: 1.0,
            jitter_factor: 0.5,
            ..RetryConfig::default()
        };
        for _ in 0..50 {
            let d = config.delay_for(0).as_millis();
            assert!((500..=1500).contains(&d), "delay {d}ms outside jitter band");
        }
    }
}
