//! Sub-agents: a named binding of system prompt, provider, and memory store.

pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use relay_store::MemoryStore;

use crate::provider::Provider;

pub use registry::AgentRegistry;

/// Input to a sub-agent execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionInput {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl ExecutionInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Outcome of a sub-agent execution. Failures are data, not errors: the
/// caller decides whether a failed task sinks the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// One LM-backed agent with its own memory timeline.
pub struct SubAgent {
    name: String,
    description: String,
    system_prompt: String,
    provider: Arc<Provider>,
    store: MemoryStore,
}

impl SubAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        provider: Arc<Provider>,
        store: MemoryStore,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            provider,
            store,
        }
    }

    /// Create a throwaway agent with a unique name derived from `name_hint`.
    ///
    /// The uuid suffix keeps memory timelines of separate instances apart
    /// even when the orchestrator spins up one agent per task with the same
    /// hint.
    pub fn implicit(
        name_hint: &str,
        system_prompt: impl Into<String>,
        provider: Arc<Provider>,
        store: MemoryStore,
    ) -> Self {
        let name = format!("{name_hint}-{}", Uuid::new_v4());
        Self::new(name, "", system_prompt, provider, store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run one exchange against the provider.
    ///
    /// The provider has already retried transient failures, so a failure
    /// here is final and is returned as an unsuccessful result rather than
    /// an error. On success the `(input, output)` pair is appended to this
    /// agent's memory; a memory write failure is logged but does not void
    /// the completion.
    pub async fn execute(&self, input: ExecutionInput) -> ExecutionResult {
        let prompt = if self.system_prompt.trim().is_empty() {
            input.content.clone()
        } else {
            format!("{}\n\n{}", self.system_prompt, input.content)
        };

        match self.provider.generate(&prompt).await {
            Ok(output) => {
                debug!(agent = %self.name, "execution succeeded");
                let entry = format!("input: {}\noutput: {}", input.content, output);
                if let Err(error) = self.store.append_agent_memory(&self.name, &entry).await {
                    warn!(agent = %self.name, %error, "failed to append agent memory");
                }
                ExecutionResult::ok(output)
            }
            Err(error) => {
                warn!(agent = %self.name, %error, "execution failed");
                ExecutionResult::failed(error.to_string())
            }
        }
    }
}

impl std::fmt::Debug for SubAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
