//! Resilience primitives wrapped around every LM provider call: bounded
//! retry with exponential backoff and jitter, a token-bucket rate limiter,
//! and a per-(provider, model) circuit breaker.

pub mod circuit;
pub mod rate_limit;
pub mod retry;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::{RetryConfig, RetryError, RetryExecutor};
