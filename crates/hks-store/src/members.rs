use chrono::{DateTime, Utc};
use hks_core::{Error, MemberRole, Result, UserId, WorkspaceId, WorkspaceMember};
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct MemberRow {
    workspace_id: uuid::Uuid,
    user_id: uuid::Uuid,
    role: String,
    added_by: uuid::Uuid,
    added_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_domain(self) -> WorkspaceMember {
        WorkspaceMember {
            workspace_id: self.workspace_id,
            user_id: self.user_id,
            role: self.role.parse::<MemberRole>().unwrap_or(MemberRole::Viewer),
            added_by: self.added_by,
            added_at: self.added_at,
        }
    }
}

const SELECT_COLUMNS: &str = "workspace_id, user_id, role, added_by, added_at";

/// PostgreSQL-backed CRUD store for the `workspace_members` table.
#[derive(Clone)]
pub struct WorkspaceMemberStore {
    pool: PgPool,
}

impl WorkspaceMemberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, member: &WorkspaceMember) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, added_by, added_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(member.workspace_id)
        .bind(member.user_id)
        .bind(member.role.to_string())
        .bind(member.added_by)
        .bind(member.added_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::Conflict(format!("user {} is already a member of workspace {}", member.user_id, member.workspace_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, workspace_id: WorkspaceId, user_id: UserId) -> Result<WorkspaceMember> {
        let row: MemberRow = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM workspace_members WHERE workspace_id = $1 AND user_id = $2"
        ))
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(format!("member {user_id} of workspace {workspace_id}")))?;
        Ok(row.into_domain())
    }

    pub async fn list_for_workspace(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceMember>> {
        let rows: Vec<MemberRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM workspace_members WHERE workspace_id = $1 ORDER BY added_at ASC"
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MemberRow::into_domain).collect())
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<WorkspaceMember>> {
        let rows: Vec<MemberRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM workspace_members WHERE user_id = $1 ORDER BY added_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MemberRow::into_domain).collect())
    }

    pub async fn update_role(&self, workspace_id: WorkspaceId, user_id: UserId, role: MemberRole) -> Result<()> {
        let result = sqlx::query(
            "UPDATE workspace_members SET role = $3 WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("member {user_id} of workspace {workspace_id}")));
        }
        Ok(())
    }

    /// Count members holding `Admin` in `workspace_id`, used to guard the
    /// "last admin cannot be demoted or removed" invariant.
    pub async fn count_admins(&self, workspace_id: WorkspaceId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM workspace_members WHERE workspace_id = $1 AND role = $2",
        )
        .bind(workspace_id)
        .bind(MemberRole::Admin.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    pub async fn remove(&self, workspace_id: WorkspaceId, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM workspace_members WHERE workspace_id = $1 AND user_id = $2")
            .bind(workspace_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
