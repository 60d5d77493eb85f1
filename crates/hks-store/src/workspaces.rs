use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hks_core::{ClusterInfo, Error, OrganizationId, Result, Workspace, WorkspaceId, WorkspacePlan, WorkspaceStatus};
use serde_json::Value;
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: uuid::Uuid,
    organization_id: uuid::Uuid,
    name: String,
    description: Option<String>,
    plan: String,
    plan_id: Option<String>,
    status: String,
    settings: Value,
    cluster_info: Value,
    kubeconfig: Option<String>,
    namespace: String,
    api_endpoint: Option<String>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkspaceRow {
    fn into_domain(self) -> Workspace {
        Workspace {
            id: self.id,
            organization_id: self.organization_id,
            name: self.name,
            description: self.description,
            plan: self.plan.parse::<WorkspacePlan>().unwrap_or(WorkspacePlan::Shared),
            plan_id: self.plan_id,
            status: self.status.parse::<WorkspaceStatus>().unwrap_or(WorkspaceStatus::Failed),
            settings: serde_json::from_value(self.settings).unwrap_or_default(),
            cluster_info: serde_json::from_value(self.cluster_info).unwrap_or_default(),
            kubeconfig: self.kubeconfig,
            namespace: self.namespace,
            api_endpoint: self.api_endpoint,
            metadata: serde_json::from_value(self.metadata).unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, organization_id, name, description, plan, plan_id, status, \
     settings, cluster_info, kubeconfig, namespace, api_endpoint, metadata, created_at, updated_at";

#[derive(Clone)]
pub struct WorkspaceStore {
    pool: PgPool,
}

/// Pagination/status/search filter for `ListWorkspaces`.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFilter {
    pub organization_id: Option<OrganizationId>,
    pub status: Option<WorkspaceStatus>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl WorkspaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new workspace. Fails with `Error::Conflict` if
    /// `(organization_id, name)` already exists.
    pub async fn create(&self, ws: &Workspace) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO workspaces (
                id, organization_id, name, description, plan, plan_id, status,
                settings, cluster_info, kubeconfig, namespace, api_endpoint, metadata,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(ws.id)
        .bind(ws.organization_id)
        .bind(&ws.name)
        .bind(&ws.description)
        .bind(ws.plan.to_string())
        .bind(&ws.plan_id)
        .bind(ws.status.to_string())
        .bind(serde_json::to_value(&ws.settings)?)
        .bind(serde_json::to_value(&ws.cluster_info)?)
        .bind(&ws.kubeconfig)
        .bind(&ws.namespace)
        .bind(&ws.api_endpoint)
        .bind(serde_json::to_value(&ws.metadata)?)
        .bind(ws.created_at)
        .bind(ws.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::Conflict(format!("workspace {}/{} already exists", ws.organization_id, ws.name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: WorkspaceId) -> Result<Workspace> {
        let row: WorkspaceRow = sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM workspaces WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("workspace {id}")))?;
        Ok(row.into_domain())
    }

    pub async fn list(&self, filter: &WorkspaceFilter) -> Result<Vec<Workspace>> {
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM workspaces WHERE 1 = 1");
        let mut idx = 1;
        if filter.organization_id.is_some() {
            sql.push_str(&format!(" AND organization_id = ${idx}"));
            idx += 1;
        }
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${idx}"));
            idx += 1;
        }
        if filter.search.is_some() {
            sql.push_str(&format!(" AND name ILIKE ${idx}"));
            idx += 1;
        }
        sql.push_str(" ORDER BY created_at DESC");
        sql.push_str(&format!(" LIMIT ${idx} OFFSET ${}", idx + 1));

        let mut query = sqlx::query_as::<_, WorkspaceRow>(&sql);
        if let Some(org) = filter.organization_id {
            query = query.bind(org);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }
        if let Some(search) = &filter.search {
            query = query.bind(format!("%{search}%"));
        }
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        query = query.bind(limit).bind(filter.offset.max(0));

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(WorkspaceRow::into_domain).collect())
    }

    pub async fn update_status(&self, id: WorkspaceId, status: WorkspaceStatus) -> Result<()> {
        sqlx::query("UPDATE workspaces SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_fields(&self, id: WorkspaceId, name: Option<&str>, description: Option<&str>, settings: Option<&HashMap<String, Value>>) -> Result<()> {
        if let Some(name) = name {
            sqlx::query("UPDATE workspaces SET name = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(name)
                .execute(&self.pool)
                .await?;
        }
        if let Some(description) = description {
            sqlx::query("UPDATE workspaces SET description = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(description)
                .execute(&self.pool)
                .await?;
        }
        if let Some(settings) = settings {
            sqlx::query("UPDATE workspaces SET settings = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(serde_json::to_value(settings)?)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn update_cluster_info(&self, id: WorkspaceId, info: &ClusterInfo) -> Result<()> {
        sqlx::query("UPDATE workspaces SET cluster_info = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(serde_json::to_value(info)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_kubeconfig(&self, id: WorkspaceId, kubeconfig: &str) -> Result<()> {
        sqlx::query("UPDATE workspaces SET kubeconfig = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(kubeconfig)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: WorkspaceId) -> Result<()> {
        sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
