use chrono::{DateTime, Utc};
use hks_core::{Result, ResourceUsage, WorkspaceId};
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct ResourceUsageRow {
    workspace_id: uuid::Uuid,
    cpu_millicores: i64,
    memory_bytes: i64,
    storage_bytes: i64,
    pod_count: i32,
    sampled_at: DateTime<Utc>,
}

impl From<ResourceUsageRow> for ResourceUsage {
    fn from(row: ResourceUsageRow) -> Self {
        ResourceUsage {
            workspace_id: row.workspace_id,
            cpu_millicores: row.cpu_millicores.max(0) as u64,
            memory_bytes: row.memory_bytes.max(0) as u64,
            storage_bytes: row.storage_bytes.max(0) as u64,
            pod_count: row.pod_count.max(0) as u32,
            sampled_at: row.sampled_at,
        }
    }
}

/// Durable record of the latest sample a `VClusterClient::get_resource_metrics`
/// call produced for a workspace. Never authoritative on its own -- a fresh
/// read always goes back to the cluster; this table only backs the
/// "last known" view when the cluster is unreachable.
#[derive(Clone)]
pub struct ResourceUsageStore {
    pool: PgPool,
}

impl ResourceUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the latest sample for a workspace; one row per workspace.
    pub async fn record(&self, usage: &ResourceUsage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resource_usages (
                workspace_id, cpu_millicores, memory_bytes, storage_bytes, pod_count, sampled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (workspace_id) DO UPDATE SET
                cpu_millicores = EXCLUDED.cpu_millicores,
                memory_bytes = EXCLUDED.memory_bytes,
                storage_bytes = EXCLUDED.storage_bytes,
                pod_count = EXCLUDED.pod_count,
                sampled_at = EXCLUDED.sampled_at
            "#,
        )
        .bind(usage.workspace_id)
        .bind(usage.cpu_millicores as i64)
        .bind(usage.memory_bytes as i64)
        .bind(usage.storage_bytes as i64)
        .bind(usage.pod_count as i32)
        .bind(usage.sampled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest(&self, workspace_id: WorkspaceId) -> Result<Option<ResourceUsage>> {
        let row: Option<ResourceUsageRow> = sqlx::query_as(
            "SELECT workspace_id, cpu_millicores, memory_bytes, storage_bytes, pod_count, sampled_at \
             FROM resource_usages WHERE workspace_id = $1",
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn delete(&self, workspace_id: WorkspaceId) -> Result<()> {
        sqlx::query("DELETE FROM resource_usages WHERE workspace_id = $1")
            .bind(workspace_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
