//! Circuit breaker: fail fast when a provider keeps failing.
//!
//! Three states. `Closed` passes every request and counts consecutive
//! failures; hitting the threshold opens the circuit. `Open` rejects
//! requests until the cooldown elapses, then admits a single probe
//! (`HalfOpen`). The probe's outcome either closes the circuit or re-opens
//! it for another cooldown.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker thresholds. Defaults are a starting point, not a contract.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

/// Returned when the circuit rejects a request.
#[derive(Debug, Error)]
#[error("circuit open, next probe in {retry_in:?}")]
pub struct CircuitOpen {
    pub retry_in: Duration,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// A single breaker instance, shared via `Arc` between a provider and any
/// registry that handed it out.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Ask permission to make a call.
    ///
    /// In `Open`, the call is rejected until the cooldown elapses; the first
    /// caller after the cooldown becomes the half-open probe. In `HalfOpen`,
    /// only that single probe is admitted.
    pub async fn try_acquire(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!("circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(CircuitOpen {
                        retry_in: self.config.open_duration - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(CircuitOpen {
                        retry_in: Duration::ZERO,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                info!("probe succeeded, closing circuit");
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening circuit"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!("probe failed, re-opening circuit");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Current state, without triggering the cooldown transition.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Breakers keyed by `(provider, model)` so every provider instance that
/// talks to the same upstream shares one circuit.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<(String, String), Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Get the breaker for a `(provider, model)` pair, creating it on first
    /// use.
    pub async fn breaker_for(&self, provider: &str, model: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().await;
        breakers
            .entry((provider.to_owned(), model.to_owned()))
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.clone())))
            .clone()
    }

    /// Number of distinct breakers created so far.
    pub async fn len(&self) -> usize {
        self.breakers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.breakers.lock().await.is_empty()
    }
}
