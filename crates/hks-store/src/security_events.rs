use chrono::{DateTime, Utc};
use hks_core::{Result, SecurityEvent, SecurityLevel, UserId};
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct SecurityEventRow {
    id: uuid::Uuid,
    user_id: Option<uuid::Uuid>,
    event_type: String,
    description: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    level: String,
    created_at: DateTime<Utc>,
}

impl SecurityEventRow {
    fn into_domain(self) -> SecurityEvent {
        SecurityEvent {
            id: self.id,
            user_id: self.user_id,
            event_type: self.event_type,
            description: self.description,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            level: self.level.parse::<SecurityLevel>().unwrap_or(SecurityLevel::Info),
            created_at: self.created_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, event_type, description, ip_address, user_agent, level, created_at";

/// Append-only audit log for the `security_events` table. There is no
/// update or delete here deliberately -- the store offers insert and
/// read-only queries only.
#[derive(Clone)]
pub struct SecurityEventStore {
    pool: PgPool,
}

impl SecurityEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, event: &SecurityEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO security_events (id, user_id, event_type, description, ip_address, user_agent, level, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(&event.event_type)
        .bind(&event.description)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(event.level.to_string())
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: UserId, limit: i64) -> Result<Vec<SecurityEvent>> {
        let rows: Vec<SecurityEventRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM security_events WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SecurityEventRow::into_domain).collect())
    }

    pub async fn list_by_level(&self, level: SecurityLevel, limit: i64) -> Result<Vec<SecurityEvent>> {
        let rows: Vec<SecurityEventRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM security_events WHERE level = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(level.to_string())
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SecurityEventRow::into_domain).collect())
    }

    /// Background sweeper: drops audit rows older than `before`.
    pub async fn cleanup_older_than(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM security_events WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
