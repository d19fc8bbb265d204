use thiserror::Error;

/// Errors surfaced by the memory store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A plan is already saved under this workflow id. Plans are immutable;
    /// the caller should resume instead of re-planning.
    #[error("a plan already exists for workflow {0:?}")]
    AlreadyExists(String),

    /// The underlying storage could not be reached or the query failed.
    /// There is no local fallback; the caller decides whether to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// A stored value could not be serialized or deserialized.
    #[error("stored value could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}
