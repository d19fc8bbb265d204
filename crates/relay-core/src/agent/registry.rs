//! Agent registry -- a named collection of long-lived sub-agents.
//!
//! Registration is expected to happen during setup; execution only reads.
//! Implicit per-task agents never pass through here.

use std::collections::HashMap;
use std::sync::Arc;

use super::SubAgent;

/// A collection of registered [`SubAgent`]s, keyed by agent name.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<SubAgent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under the name it carries.
    ///
    /// If an agent with the same name is already registered, it is replaced
    /// and the old one is returned.
    pub fn register(&mut self, agent: SubAgent) -> Option<Arc<SubAgent>> {
        let name = agent.name().to_owned();
        self.agents.insert(name, Arc::new(agent))
    }

    /// Look up an agent by name.
    pub fn get(&self, name: &str) -> Option<Arc<SubAgent>> {
        self.agents.get(name).cloned()
    }

    /// List the names of all registered agents.
    ///
    /// The order is not guaranteed (HashMap iteration order).
    pub fn list(&self) -> Vec<&str> {
        self.agents.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}
