//! Provider error taxonomy.
//!
//! [`LmError`] is the closed set of failures a vendor client can report.
//! [`ProviderError`] is what `Provider::generate` surfaces: the underlying
//! kind plus the call context (correlation id, provider/model, duration,
//! attempts) and a recovery hint.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Failure kinds a vendor client may report from a single call.
#[derive(Debug, Clone, Error)]
pub enum LmError {
    /// Missing or invalid credentials. Terminal; never retried.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The upstream throttled the request. Retryable; may carry a hint for
    /// how long to back off.
    #[error("rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The call exceeded its deadline. Retryable.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure. Retryable.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Upstream 5xx or open circuit. Retryable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upstream rejected the request (4xx other than rate limit). Terminal.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Prompt or response exceeded a size limit. Terminal.
    #[error("size limit exceeded: {0}")]
    SizeExceeded(String),
}

impl LmError {
    /// Whether this kind is transient by classification alone (message
    /// heuristics may widen this; see the classifier).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. }
                | Self::Timeout(_)
                | Self::NetworkError(_)
                | Self::ServiceUnavailable(_)
        )
    }

    /// What the caller should do about this error.
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::AuthFailed(_) => RecoveryHint::CheckCredentials,
            Self::RateLimitExceeded { .. }
            | Self::Timeout(_)
            | Self::NetworkError(_)
            | Self::ServiceUnavailable(_) => RecoveryHint::RetryWithBackoff,
            Self::InvalidRequest(_) => RecoveryHint::FixConfiguration,
            Self::SizeExceeded(_) => RecoveryHint::UserActionRequired,
        }
    }
}

/// Coarse guidance attached to every surfaced provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    RetryWithBackoff,
    CheckCredentials,
    FixConfiguration,
    UserActionRequired,
}

impl fmt::Display for RecoveryHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RetryWithBackoff => "retry_with_backoff",
            Self::CheckCredentials => "check_credentials",
            Self::FixConfiguration => "fix_configuration",
            Self::UserActionRequired => "user_action_required",
        };
        f.write_str(s)
    }
}

/// A provider failure with full call context.
#[derive(Debug, Error)]
#[error(
    "{source} (operation {operation:?}, {provider}/{model}, \
     correlation {correlation_id}, attempt {attempt}/{max_attempts}, \
     after {duration_ms}ms; recovery: {hint})"
)]
pub struct ProviderError {
    #[source]
    pub source: LmError,
    pub correlation_id: Uuid,
    pub operation: &'static str,
    pub provider: String,
    pub model: String,
    pub duration_ms: u64,
    /// Attempts made within the outer call; 0 when the call never reached
    /// the vendor client (rate limiter or circuit rejected it).
    pub attempt: u32,
    pub max_attempts: u32,
    pub hint: RecoveryHint,
}

impl ProviderError {
    /// The underlying failure kind.
    pub fn kind(&self) -> &LmError {
        &self.source
    }
}
