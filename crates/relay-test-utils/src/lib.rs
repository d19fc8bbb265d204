//! Shared test utilities for relay integration tests.
//!
//! Every test gets its own tempfile-backed SQLite store so tests can run
//! concurrently without touching each other's data. Keep the returned
//! [`tempfile::TempDir`] alive for the duration of the test: dropping it
//! deletes the database file.

use tempfile::TempDir;

use relay_store::{MemoryStore, StoreConfig};

/// Create a store backed by a fresh temporary directory, with migrations
/// applied and the default memory limit.
pub async fn test_store() -> (MemoryStore, TempDir) {
    test_store_with_memory_limit(StoreConfig::DEFAULT_MEMORY_LIMIT).await
}

/// Create a store with an explicit agent-memory limit.
pub async fn test_store_with_memory_limit(limit: usize) -> (MemoryStore, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir for test store");
    let config = StoreConfig::new(StoreConfig::url_in_dir(dir.path())).with_memory_limit(limit);
    let store = MemoryStore::open(&config)
        .await
        .expect("failed to open test store");
    (store, dir)
}
