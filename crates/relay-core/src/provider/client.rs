//! The `LmClient` trait -- the adapter seam for LM vendors.
//!
//! Each concrete vendor adapter implements this trait. The trait is
//! intentionally object-safe so it can be stored as `Arc<dyn LmClient>`
//! inside a [`super::Provider`]; all resilience concerns (retry, rate limit,
//! circuit breaking) live outside the adapter.

use async_trait::async_trait;

use super::error::LmError;

/// A minimal vendor adapter: one prompt in, one completion out.
#[async_trait]
pub trait LmClient: Send + Sync {
    /// Vendor name, e.g. `"openai"`. Keys the circuit breaker together with
    /// [`Self::model`].
    fn name(&self) -> &str;

    /// Model identifier, e.g. `"gpt-4o-mini"`.
    fn model(&self) -> &str;

    /// Send a prompt and return the completion text.
    ///
    /// Implementations classify their own transport/API failures into the
    /// [`LmError`] taxonomy and must not retry internally.
    async fn invoke(&self, prompt: &str) -> Result<String, LmError>;
}

// Compile-time assertion: LmClient must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn LmClient) {}
};
