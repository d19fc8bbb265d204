//! Transient/permanent error classification.
//!
//! The retry executor consults a classifier before retrying. The default
//! classifies by error kind first, then widens terminal kinds whose message
//! matches a known transient marker -- vendors sometimes wrap a throttle or
//! an upstream hiccup in a generic 4xx. Authentication failures are never
//! retried. A vendor adapter with quirks of its own supplies an override
//! closure instead of subclassing anything.

use std::sync::Arc;

use super::error::LmError;

/// Decides whether an error is worth retrying.
pub type Classifier = Arc<dyn Fn(&LmError) -> bool + Send + Sync>;

/// Message substrings that mark an error as transient regardless of kind.
pub const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "rate limit",
    "429",
    "503",
    "throttl",
    "overloaded",
    "temporarily unavailable",
    "try again",
];

/// The default classification rule.
pub fn is_transient(error: &LmError) -> bool {
    match error {
        LmError::AuthFailed(_) => false,
        e if e.is_transient() => true,
        e => {
            let message = e.to_string().to_ascii_lowercase();
            TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
        }
    }
}

/// The default classifier as a shareable closure.
pub fn default_classifier() -> Classifier {
    Arc::new(is_transient)
}
