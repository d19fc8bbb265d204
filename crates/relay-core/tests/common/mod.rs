//! Shared helpers for relay-core integration tests: a scriptable mock
//! LM client and a fast-retry config so failure paths don't sleep.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use relay_core::config::CoreConfig;
use relay_core::provider::{LmClient, LmError, Provider};
use relay_core::resilience::RetryConfig;

type ResponderFn = Box<dyn Fn(&str) -> Result<String, LmError> + Send + Sync>;

enum Responder {
    /// Pop one response per call, in order.
    Scripted(Mutex<VecDeque<Result<String, LmError>>>),
    /// Compute the response from the prompt.
    Fn(ResponderFn),
}

type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// A mock LM client that records every prompt it receives. An optional
/// per-prompt delay (an async sleep, so timeouts and cancellation behave as
/// they would against a real network call) runs before the responder.
pub struct MockLm {
    name: String,
    responder: Responder,
    delay: Option<DelayFn>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLm {
    pub fn scripted(
        name: &str,
        responses: Vec<Result<String, LmError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            responder: Responder::Scripted(Mutex::new(responses.into())),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn respond_with(
        name: &str,
        f: impl Fn(&str) -> Result<String, LmError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            responder: Responder::Fn(Box::new(f)),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Like [`Self::respond_with`], but sleeps for `delay(prompt)` before
    /// answering.
    pub fn slow_respond_with(
        name: &str,
        delay: impl Fn(&str) -> Duration + Send + Sync + 'static,
        f: impl Fn(&str) -> Result<String, LmError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            responder: Responder::Fn(Box::new(f)),
            delay: Some(Box::new(delay)),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl LmClient for MockLm {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-1"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_owned());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }
        match &self.responder {
            Responder::Scripted(queue) => queue
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Err(LmError::InvalidRequest("script exhausted".into()))),
            Responder::Fn(f) => f(prompt),
        }
    }
}

/// Retry config with millisecond delays so exhausting retries is fast.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 1.0,
        jitter_factor: 0.0,
        max_total_duration: Duration::from_secs(5),
    }
}

/// Core config with fast retries, for workflows expected to hit failures.
pub fn fast_config() -> CoreConfig {
    CoreConfig {
        retry: fast_retry(),
        ..CoreConfig::default()
    }
}

/// Wrap a mock in a provider with fast retries.
pub fn provider(client: Arc<MockLm>) -> Arc<Provider> {
    Arc::new(Provider::builder(client).retry(fast_retry()).build())
}

/// Install a tracing subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
