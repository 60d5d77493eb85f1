use chrono::{DateTime, Utc};
use hks_core::{Error, Result, Session, SessionId, UserId};
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    refresh_token_hash: String,
    refresh_token_selector: String,
    salt: String,
    device_id: Option<String>,
    ip_address: String,
    user_agent: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    revoked: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            refresh_token_hash: row.refresh_token_hash,
            refresh_token_selector: row.refresh_token_selector,
            salt: row.salt,
            device_id: row.device_id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked: row.revoked,
        }
    }
}

/// PostgreSQL-backed CRUD store for the `sessions` table.
///
/// Callers are responsible for hashing refresh tokens before calling
/// `create`/`rotate` -- this store never sees a plaintext token, and never
/// calls the hash service itself.
#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, user_id, refresh_token_hash, refresh_token_selector, salt,
                device_id, ip_address, user_agent, expires_at, created_at, last_used_at, revoked
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.refresh_token_selector)
        .bind(&session.salt)
        .bind(&session.device_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_used_at)
        .bind(session.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: SessionId) -> Result<Session> {
        let row: SessionRow = sqlx::query_as(
            "SELECT id, user_id, refresh_token_hash, refresh_token_selector, salt, device_id, \
             ip_address, user_agent, expires_at, created_at, last_used_at, revoked \
             FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(format!("session {id}")))?;
        Ok(row.into())
    }

    /// O(1) lookup by the short `selector`, prior to the constant-time hash
    /// comparison the auth service performs on the returned row.
    pub async fn get_by_selector(&self, selector: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, refresh_token_hash, refresh_token_selector, salt, device_id, \
             ip_address, user_agent, expires_at, created_at, last_used_at, revoked \
             FROM sessions WHERE refresh_token_selector = $1",
        )
        .bind(selector)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, refresh_token_hash, refresh_token_selector, salt, device_id, \
             ip_address, user_agent, expires_at, created_at, last_used_at, revoked \
             FROM sessions WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn mark_revoked(&self, id: SessionId) -> Result<()> {
        sqlx::query("UPDATE sessions SET revoked = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: SessionId) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Background sweeper: remove sessions that expired before `before`.
    pub async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
