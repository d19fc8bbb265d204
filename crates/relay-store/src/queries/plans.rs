//! Query functions for the `plans` table.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::{TaskDefinition, WorkflowSummary};

/// Save a plan under a workflow id.
///
/// Plans are immutable: a second save for the same workflow fails with
/// [`StoreError::AlreadyExists`]. The orchestrator checks `load_plan` first,
/// so hitting this error indicates a caller raced itself.
pub async fn save_plan(
    pool: &SqlitePool,
    workflow_id: &str,
    plan: &[TaskDefinition],
) -> Result<(), StoreError> {
    let json = serde_json::to_string(plan)?;
    let result = sqlx::query(
        "INSERT INTO plans (workflow_id, plan, created_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (workflow_id) DO NOTHING",
    )
    .bind(workflow_id)
    .bind(json)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::AlreadyExists(workflow_id.to_owned()));
    }

    Ok(())
}

/// Load the plan stored for a workflow, if any.
pub async fn load_plan(
    pool: &SqlitePool,
    workflow_id: &str,
) -> Result<Option<Vec<TaskDefinition>>, StoreError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT plan FROM plans WHERE workflow_id = $1")
            .bind(workflow_id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// List all stored workflows, newest first.
pub async fn list_workflows(pool: &SqlitePool) -> Result<Vec<WorkflowSummary>, StoreError> {
    let rows = sqlx::query_as::<_, WorkflowSummary>(
        "SELECT workflow_id, created_at FROM plans ORDER BY created_at DESC, workflow_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Delete a workflow's plan and task outputs.
///
/// Silently succeeds when the workflow does not exist. Agent memory is left
/// untouched: agents are scoped per instance, not per workflow.
pub async fn delete_workflow(pool: &SqlitePool, workflow_id: &str) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM task_outputs WHERE workflow_id = $1")
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM plans WHERE workflow_id = $1")
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
