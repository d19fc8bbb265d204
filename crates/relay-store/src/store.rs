use std::collections::HashMap;
use std::path::Path;

use sqlx::SqlitePool;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{TaskDefinition, WorkflowState, WorkflowSummary};
use crate::{pool, queries};

/// Facade over the SQLite pool: plans, task outputs, and agent memory for
/// every workflow in one store.
///
/// Cloning is cheap (the pool is internally shared), so a store can be handed
/// to concurrently running tasks freely.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pool: SqlitePool,
    memory_limit: usize,
}

impl MemoryStore {
    /// Open (and migrate) the store described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = pool::create_pool(config).await?;
        Ok(Self {
            pool,
            memory_limit: config.memory_limit,
        })
    }

    /// Open a store backed by `relay.db` inside `dir`. The directory must
    /// exist.
    pub async fn open_in_dir(dir: &Path) -> Result<Self, StoreError> {
        Self::open(&StoreConfig::new(StoreConfig::url_in_dir(dir))).await
    }

    /// Wrap an existing pool. Migrations must already have been applied.
    pub fn new(pool: SqlitePool, memory_limit: usize) -> Self {
        Self { pool, memory_limit }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The configured agent-memory limit.
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    // -- plans --------------------------------------------------------------

    /// Save an immutable plan. Fails with [`StoreError::AlreadyExists`] if
    /// the workflow already has one.
    pub async fn save_plan(
        &self,
        workflow_id: &str,
        plan: &[TaskDefinition],
    ) -> Result<(), StoreError> {
        queries::plans::save_plan(&self.pool, workflow_id, plan).await
    }

    /// Load the plan for a workflow, if one was saved.
    pub async fn load_plan(
        &self,
        workflow_id: &str,
    ) -> Result<Option<Vec<TaskDefinition>>, StoreError> {
        queries::plans::load_plan(&self.pool, workflow_id).await
    }

    /// List stored workflows, newest first.
    pub async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
        queries::plans::list_workflows(&self.pool).await
    }

    /// Delete a workflow's plan and task outputs.
    pub async fn delete_workflow(&self, workflow_id: &str) -> Result<(), StoreError> {
        queries::plans::delete_workflow(&self.pool, workflow_id).await
    }

    // -- task outputs -------------------------------------------------------

    /// Save a task output (last writer wins).
    pub async fn save_task_output(
        &self,
        workflow_id: &str,
        task_name: &str,
        output: &str,
    ) -> Result<(), StoreError> {
        queries::task_outputs::save_task_output(&self.pool, workflow_id, task_name, output).await
    }

    /// All stored outputs for a workflow, keyed by task name.
    pub async fn load_task_outputs(
        &self,
        workflow_id: &str,
    ) -> Result<HashMap<String, String>, StoreError> {
        queries::task_outputs::load_task_outputs(&self.pool, workflow_id).await
    }

    // -- agent memory -------------------------------------------------------

    /// Append an entry to an agent's memory, trimming the oldest entries
    /// beyond the configured limit.
    pub async fn append_agent_memory(
        &self,
        agent_name: &str,
        entry: &str,
    ) -> Result<(), StoreError> {
        queries::agent_memory::append_agent_memory(&self.pool, agent_name, entry, self.memory_limit)
            .await
    }

    /// The most recent `limit` memory entries for an agent, oldest-first.
    pub async fn load_agent_memory(
        &self,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        queries::agent_memory::load_agent_memory(&self.pool, agent_name, limit).await
    }

    // -- derived state ------------------------------------------------------

    /// Infer the workflow's lifecycle state from what the store holds.
    ///
    /// Only tasks named in the plan count toward completion; stray outputs
    /// (e.g. from a deleted-and-recreated plan) are ignored.
    pub async fn workflow_state(&self, workflow_id: &str) -> Result<WorkflowState, StoreError> {
        let Some(plan) = self.load_plan(workflow_id).await? else {
            return Ok(WorkflowState::New);
        };
        let outputs = self.load_task_outputs(workflow_id).await?;

        let total = plan.len();
        let completed = plan
            .iter()
            .filter(|task| outputs.contains_key(&task.name))
            .count();

        if completed == total {
            Ok(WorkflowState::Complete)
        } else {
            Ok(WorkflowState::Planned { completed, total })
        }
    }
}
