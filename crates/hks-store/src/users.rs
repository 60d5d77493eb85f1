use chrono::{DateTime, Utc};
use hks_core::{Error, Result, User, UserId};
use sqlx::postgres::PgPool;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    external_id: String,
    provider: String,
    email: String,
    display_name: String,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            external_id: row.external_id,
            provider: row.provider,
            email: row.email,
            display_name: row.display_name,
            avatar: row.avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        }
    }
}

/// PostgreSQL-backed CRUD store for the `users` table.
#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, external_id, provider, email, display_name, avatar, created_at, updated_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.external_id)
        .bind(&user.provider)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            "SELECT id, external_id, provider, email, display_name, avatar, created_at, updated_at, last_login_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {id}")))?;
        Ok(row.into())
    }

    /// Look up a user by the `(external_id, provider)` unique pair used at
    /// OAuth-callback time.
    pub async fn get_by_external_id(&self, external_id: &str, provider: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, external_id, provider, email, display_name, avatar, created_at, updated_at, last_login_at \
             FROM users WHERE external_id = $1 AND provider = $2",
        )
        .bind(external_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Refresh `last_login_at` (and `updated_at`) for an existing user.
    pub async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_profile(&self, id: UserId, email: &str, display_name: &str, avatar: Option<&str>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET email = $2, display_name = $3, avatar = $4, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(email)
        .bind(display_name)
        .bind(avatar)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
