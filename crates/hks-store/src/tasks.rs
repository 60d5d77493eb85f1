use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hks_core::{Error, Result, Task, TaskId, TaskStatus, TaskType, WorkspaceId};
use serde_json::Value;
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    task_type: String,
    status: String,
    progress: i16,
    message: Option<String>,
    error: Option<String>,
    payload: Value,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    cancelling: bool,
}

impl TaskRow {
    fn into_domain(self) -> Task {
        Task {
            id: self.id,
            workspace_id: self.workspace_id,
            task_type: self.task_type.parse::<TaskType>().unwrap_or(TaskType::ProvisionVcluster),
            status: self.status.parse::<TaskStatus>().unwrap_or(TaskStatus::Failed),
            progress: self.progress.clamp(0, 100) as u8,
            message: self.message,
            error: self.error,
            payload: serde_json::from_value::<HashMap<String, Value>>(self.payload).unwrap_or_default(),
            metadata: serde_json::from_value::<HashMap<String, Value>>(self.metadata).unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            cancelling: self.cancelling,
        }
    }
}

const SELECT_COLUMNS: &str = "id, workspace_id, task_type, status, progress, message, error, \
     payload, metadata, created_at, updated_at, completed_at, cancelling";

/// PostgreSQL-backed durable queue for the `tasks` table. Claim semantics
/// (compare-and-swap on `status`, worker ownership via `claimed_by`) live
/// here rather than in the engine so the claim itself is a single
/// round-trip, race-free statement.
#[derive(Clone)]
pub struct TaskStore {
    pool: PgPool,
}

impl TaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, workspace_id, task_type, status, progress, message, error,
                payload, metadata, created_at, updated_at, completed_at, cancelling
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(task.id)
        .bind(task.workspace_id)
        .bind(task.task_type.to_string())
        .bind(task.status.to_string())
        .bind(task.progress as i16)
        .bind(&task.message)
        .bind(&task.error)
        .bind(serde_json::to_value(&task.payload)?)
        .bind(serde_json::to_value(&task.metadata)?)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .bind(task.cancelling)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: TaskId) -> Result<Task> {
        let row: TaskRow = sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("task {id}")))?;
        Ok(row.into_domain())
    }

    pub async fn list_for_workspace(&self, workspace_id: WorkspaceId) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM tasks WHERE workspace_id = $1 ORDER BY created_at DESC"
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TaskRow::into_domain).collect())
    }

    /// Atomically claim up to `limit` pending tasks of `task_type` for
    /// `worker_id`, flipping them to `running` in the same statement a
    /// concurrent worker would contend on. Returns only the tasks this call
    /// actually won.
    pub async fn claim_pending(&self, task_type: TaskType, worker_id: &str, limit: i64) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"
            UPDATE tasks SET status = 'running', claimed_by = $1, updated_at = now()
            WHERE id IN (
                SELECT id FROM tasks WHERE status = 'pending' AND task_type = $2
                ORDER BY created_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(worker_id)
        .bind(task_type.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TaskRow::into_domain).collect())
    }

    pub async fn update_progress(&self, id: TaskId, progress: u8, message: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE tasks SET progress = $2, message = $3, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(progress as i16)
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Terminal-state transition. Fails with `Error::Conflict` if the task
    /// already reached a terminal state.
    pub async fn complete(&self, id: TaskId, status: TaskStatus, error: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2, error = $3, progress = 100, completed_at = now(), updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!("task {id} already in a terminal state")));
        }
        Ok(())
    }

    pub async fn request_cancel(&self, id: TaskId) -> Result<()> {
        sqlx::query("UPDATE tasks SET cancelling = true WHERE id = $1 AND status NOT IN ('completed', 'failed')")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_active_for_workspace(&self, workspace_id: WorkspaceId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks WHERE workspace_id = $1 AND status IN ('pending', 'running')",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Total queue depth across every workspace, for the engine's
    /// backpressure check against `Q_max`.
    pub async fn count_pending(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Release tasks claimed by workers that died mid-lease: flip them back
    /// to `pending` so another worker can claim them.
    pub async fn requeue_stale_claims(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 'pending', claimed_by = NULL WHERE status = 'running' AND updated_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
