//! The LM provider: one concrete type composed from a vendor client plus
//! orthogonal resilience wrappers.
//!
//! Every `generate` call passes through, in order: the token-bucket rate
//! limiter, the circuit breaker, and the retry executor around the vendor
//! call. Failures carry a correlation id and full call context.

pub mod classifier;
pub mod client;
pub mod error;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, RateLimiter, RetryConfig, RetryError,
    RetryExecutor,
};

pub use classifier::{Classifier, default_classifier};
pub use client::LmClient;
pub use error::{LmError, ProviderError, RecoveryHint};

/// A resilient LM provider.
///
/// Cheap to share via `Arc`; the rate limiter is per instance, while the
/// circuit breaker may be shared across instances through a
/// [`crate::resilience::CircuitBreakerRegistry`].
pub struct Provider {
    client: Arc<dyn LmClient>,
    limiter: RateLimiter,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    classifier: Classifier,
}

impl Provider {
    /// Start building a provider around a vendor client.
    pub fn builder(client: Arc<dyn LmClient>) -> ProviderBuilder {
        ProviderBuilder {
            client,
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            breaker_config: CircuitBreakerConfig::default(),
            breaker: None,
            classifier: None,
        }
    }

    /// The vendor name of the wrapped client.
    pub fn name(&self) -> &str {
        self.client.name()
    }

    /// The model identifier of the wrapped client.
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Send a prompt through the full wrapper stack and return the
    /// completion text.
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        // 1. Rate limiter: bounded wait for a token.
        if let Err(wait) = self.limiter.acquire().await {
            return Err(self.error(
                LmError::RateLimitExceeded {
                    message: wait.to_string(),
                    retry_after: None,
                },
                correlation_id,
                started,
                0,
            ));
        }

        // 2. Circuit breaker: fail fast while the upstream is bad.
        if let Err(open) = self.breaker.try_acquire().await {
            return Err(self.error(
                LmError::ServiceUnavailable(open.to_string()),
                correlation_id,
                started,
                0,
            ));
        }

        // 3 + 4. Retry loop around the vendor call.
        let executor = RetryExecutor::new(self.retry.clone(), self.classifier.clone());
        let client = Arc::clone(&self.client);
        let outcome = executor
            .execute(|attempt| {
                let client = Arc::clone(&client);
                async move {
                    debug!(attempt, %correlation_id, "invoking model");
                    client.invoke(prompt).await
                }
            })
            .await;

        match outcome {
            Ok(text) => {
                self.breaker.record_success().await;
                debug!(
                    %correlation_id,
                    provider = self.name(),
                    model = self.model(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "generate succeeded"
                );
                Ok(text)
            }
            Err(RetryError { error, attempts }) => {
                self.breaker.record_failure().await;
                Err(self.error(error, correlation_id, started, attempts))
            }
        }
    }

    fn error(
        &self,
        source: LmError,
        correlation_id: Uuid,
        started: Instant,
        attempt: u32,
    ) -> ProviderError {
        ProviderError {
            hint: source.recovery_hint(),
            correlation_id,
            operation: "generate",
            provider: self.name().to_owned(),
            model: self.model().to_owned(),
            duration_ms: started.elapsed().as_millis() as u64,
            attempt,
            max_attempts: self.retry.max_attempts,
            source,
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("model", &self.model())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Provider`].
pub struct ProviderBuilder {
    client: Arc<dyn LmClient>,
    retry: RetryConfig,
    rate_limit: RateLimitConfig,
    breaker_config: CircuitBreakerConfig,
    breaker: Option<Arc<CircuitBreaker>>,
    classifier: Option<Classifier>,
}

impl ProviderBuilder {
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Thresholds for the breaker the builder creates. Ignored when an
    /// explicit breaker is supplied.
    pub fn circuit(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Share a breaker obtained from a registry instead of creating a
    /// private one.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Vendor-specific transient/permanent override.
    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> Provider {
        let breaker = self
            .breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::new(self.breaker_config.clone())));
        Provider {
            client: self.client,
            limiter: RateLimiter::new(self.rate_limit),
            breaker,
            retry: self.retry,
            classifier: self.classifier.unwrap_or_else(default_classifier),
        }
    }
}
