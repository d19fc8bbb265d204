//! Query functions for the `task_outputs` table.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;

/// Save a task output, replacing any previous value for the same key.
///
/// Overwrite is deliberately permitted (last writer wins): it keeps resume
/// semantics simple, and the batch executor guarantees at most one writer
/// per `(workflow_id, task_name)` via its cache check.
pub async fn save_task_output(
    pool: &SqlitePool,
    workflow_id: &str,
    task_name: &str,
    output: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO task_outputs (workflow_id, task_name, output, created_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (workflow_id, task_name) \
         DO UPDATE SET output = excluded.output, created_at = excluded.created_at",
    )
    .bind(workflow_id)
    .bind(task_name)
    .bind(output)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all outputs for a workflow as a `task_name -> output` map.
pub async fn load_task_outputs(
    pool: &SqlitePool,
    workflow_id: &str,
) -> Result<HashMap<String, String>, StoreError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT task_name, output FROM task_outputs WHERE workflow_id = $1",
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
