use std::env;
use std::path::{Path, PathBuf};

/// Store configuration.
///
/// Reads from `RELAY_DATABASE_URL` and `RELAY_MEMORY_LIMIT`, falling back to
/// a SQLite file in the platform data directory and a limit of 20 entries
/// per agent.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite connection URL, e.g. `sqlite:///home/me/.local/share/relay/relay.db`.
    pub database_url: String,
    /// Maximum agent-memory entries retained per agent.
    pub memory_limit: usize,
}

impl StoreConfig {
    /// Default number of agent-memory entries retained per agent.
    pub const DEFAULT_MEMORY_LIMIT: usize = 20;

    /// Build a config from the environment.
    ///
    /// Priority: `RELAY_DATABASE_URL` / `RELAY_MEMORY_LIMIT` env vars, then
    /// the platform defaults.
    pub fn from_env() -> Self {
        let database_url =
            env::var("RELAY_DATABASE_URL").unwrap_or_else(|_| Self::default_url());
        let memory_limit = env::var("RELAY_MEMORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_MEMORY_LIMIT);
        Self {
            database_url,
            memory_limit,
        }
    }

    /// Build a config from an explicit URL (useful for tests and embedding).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            memory_limit: Self::DEFAULT_MEMORY_LIMIT,
        }
    }

    /// Set the agent-memory limit.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Connection URL for a database file inside `dir`.
    pub fn url_in_dir(dir: &Path) -> String {
        format!("sqlite://{}", dir.join("relay.db").display())
    }

    /// The default database location: `<platform data dir>/relay/relay.db`,
    /// or `./relay.db` when no data directory can be determined.
    pub fn default_url() -> String {
        let dir = dirs::data_dir()
            .map(|d| d.join("relay"))
            .unwrap_or_else(|| PathBuf::from("."));
        format!("sqlite://{}", dir.join("relay.db").display())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
