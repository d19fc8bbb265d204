//! Token-bucket rate limiter.
//!
//! Each provider instance owns one bucket. `acquire` blocks until a token is
//! available or the configured maximum wait elapses; the caller maps an
//! exhausted wait to its rate-limit error.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-bucket parameters.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Burst capacity (whole tokens).
    pub capacity: u32,
    /// Tokens replenished per second.
    pub refill_per_sec: f64,
    /// Longest a caller will block waiting for a token.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            refill_per_sec: 10.0,
            max_wait: Duration::from_secs(30),
        }
    }
}

/// Returned when no token became available within the configured wait.
#[derive(Debug, Error)]
#[error("no rate-limit token available within {waited:?}")]
pub struct RateLimitWaitExceeded {
    pub waited: Duration,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.refill_per_sec).min(config.capacity as f64);
        self.last_refill = now;
    }
}

/// A token-bucket admission controller.
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = Bucket {
            tokens: config.capacity as f64,
            last_refill: Instant::now(),
        };
        Self {
            config,
            bucket: Mutex::new(bucket),
        }
    }

    /// Take one token, waiting for a refill if the bucket is empty.
    ///
    /// Fails once the total wait would exceed `max_wait`. A zero refill rate
    /// means an empty bucket can never recover within the wait, so the call
    /// fails immediately in that case.
    pub async fn acquire(&self) -> Result<(), RateLimitWaitExceeded> {
        let deadline = Instant::now() + self.config.max_wait;

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                bucket.refill(now, &self.config);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                if self.config.refill_per_sec <= 0.0 {
                    return Err(RateLimitWaitExceeded {
                        waited: self.config.max_wait,
                    });
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.config.refill_per_sec)
            };

            if Instant::now() + wait > deadline {
                return Err(RateLimitWaitExceeded {
                    waited: self.config.max_wait,
                });
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available (after refill). Intended for tests and
    /// diagnostics.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), &self.config);
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u32, refill_per_sec: f64, max_wait: Duration) -> RateLimitConfig {
        RateLimitConfig {
            capacity,
            refill_per_sec,
            max_wait,
        }
    }

    #[tokio::test]
    async fn burst_up_to_capacity_is_instant() {
        let limiter = RateLimiter::new(config(3, 10.0, Duration::from_secs(1)));
        for _ in 0..3 {
            limiter.acquire().await.expect("burst token");
        }
        assert!(limiter.available().await < 1.0);
    }

    #[tokio::test]
    async fn empty_bucket_with_no_refill_fails() {
        let limiter = RateLimiter::new(config(1, 0.0, Duration::from_millis(50)));
        limiter.acquire().await.expect("first token");
        let err = limiter.acquire().await.unwrap_err();
        assert_eq!(err.waited, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn waits_for_refill() {
        let limiter = RateLimiter::new(config(1, 20.0, Duration::from_secs(2)));
        limiter.acquire().await.expect("burst token");

        let started = Instant::now();
        limiter.acquire().await.expect("refilled token");
        // One token at 20/s takes ~50ms to accrue.
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn wait_longer_than_max_fails() {
        // One token per 10 seconds, but only willing to wait 50ms.
        let limiter = RateLimiter::new(config(1, 0.1, Duration::from_millis(50)));
        limiter.acquire().await.expect("burst token");
        assert!(limiter.acquire().await.is_err());
    }

    #[tokio::test]
    async fn successful_calls_bounded_by_capacity_plus_refill() {
        // Capacity 5, refill 10/s: in ~200ms at most 5 + 2 = 7 acquisitions
        // can succeed.
        let limiter = RateLimiter::new(config(5, 10.0, Duration::from_millis(1)));
        let mut granted = 0;
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(200) {
            if limiter.acquire().await.is_ok() {
                granted += 1;
            } else {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        assert!(granted <= 8, "granted {granted} tokens in 200ms");
    }
}
