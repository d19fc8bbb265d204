//! Query functions for the `agent_memory` table.
//!
//! Memory is an append-only timeline per agent name, trimmed from the head
//! so no agent retains more than the configured limit. All reads return
//! entries **oldest-first**; callers must not rely on the opposite order.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;

/// Append an entry to an agent's memory, then trim the oldest entries so at
/// most `limit` remain. Runs in a single transaction. Appends for the same
/// agent must be serialized by the caller (an agent instance executes one
/// exchange at a time); appends for distinct agents may interleave freely.
pub async fn append_agent_memory(
    pool: &SqlitePool,
    agent_name: &str,
    entry: &str,
    limit: usize,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let max_seq: Option<i64> =
        sqlx::query_scalar("SELECT MAX(seq) FROM agent_memory WHERE agent_name = $1")
            .bind(agent_name)
            .fetch_one(&mut *tx)
            .await?;
    let next = max_seq.unwrap_or(0) + 1;

    sqlx::query(
        "INSERT INTO agent_memory (agent_name, seq, entry, created_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(agent_name)
    .bind(next)
    .bind(entry)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM agent_memory WHERE agent_name = $1 AND seq <= $2")
        .bind(agent_name)
        .bind(next - limit as i64)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Load the most recent `limit` entries for an agent, oldest-first.
pub async fn load_agent_memory(
    pool: &SqlitePool,
    agent_name: &str,
    limit: usize,
) -> Result<Vec<String>, StoreError> {
    let mut rows: Vec<(String,)> = sqlx::query_as(
        "SELECT entry FROM agent_memory \
         WHERE agent_name = $1 \
         ORDER BY seq DESC \
         LIMIT $2",
    )
    .bind(agent_name)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows.into_iter().map(|(entry,)| entry).collect())
}

/// Number of entries currently stored for an agent.
pub async fn count_agent_memory(pool: &SqlitePool, agent_name: &str) -> Result<usize, StoreError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM agent_memory WHERE agent_name = $1")
            .bind(agent_name)
            .fetch_one(pool)
            .await?;
    Ok(count as usize)
}
