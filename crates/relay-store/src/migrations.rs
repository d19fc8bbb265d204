use sqlx::SqlitePool;
use tracing::debug;

use crate::error::StoreError;

/// Schema statements, applied in order. Each is idempotent so reruns on an
/// existing database are no-ops.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS plans (
        workflow_id TEXT PRIMARY KEY,
        plan        TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS task_outputs (
        workflow_id TEXT NOT NULL,
        task_name   TEXT NOT NULL,
        output      TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        PRIMARY KEY (workflow_id, task_name)
    )",
    "CREATE TABLE IF NOT EXISTS agent_memory (
        agent_name  TEXT NOT NULL,
        seq         INTEGER NOT NULL,
        entry       TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        PRIMARY KEY (agent_name, seq)
    )",
    "CREATE INDEX IF NOT EXISTS idx_task_outputs_workflow
        ON task_outputs (workflow_id)",
];

/// Apply all schema statements against the pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = MIGRATIONS.len(), "migrations applied");
    Ok(())
}
