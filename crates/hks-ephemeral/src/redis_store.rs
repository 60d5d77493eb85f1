//! Redis-backed implementation of [`EphemeralStore`].
//!
//! Uses `redis::aio::ConnectionManager`, which reconnects transparently on
//! transient failures and is cheaply cloneable, so one instance is shared
//! across every call site rather than pooled per-request.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hks_core::{AuthState, Error, Result};
use redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;

use crate::keys;
use crate::store::EphemeralStore;

/// Lua script for compare-and-delete lock release: only deletes `key` if
/// its current value equals the caller-supplied `value`. Runs atomically
/// inside Redis so the check and the delete cannot race another owner's
/// `acquire_lock`.
const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisEphemeralStore {
    conn: redis::aio::ConnectionManager,
    release_lock_script: redis::Script,
}

impl RedisEphemeralStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            release_lock_script: redis::Script::new(RELEASE_LOCK_SCRIPT),
        })
    }

    fn ttl_secs_from(expires_at: DateTime<Utc>) -> Option<i64> {
        let secs = (expires_at - Utc::now()).num_seconds();
        if secs <= 0 {
            None
        } else {
            Some(secs)
        }
    }
}

#[async_trait]
impl EphemeralStore for RedisEphemeralStore {
    async fn store_auth_state(&self, state: &AuthState) -> Result<()> {
        let Some(ttl) = Self::ttl_secs_from(state.expires_at) else {
            // Already expired by the time we'd store it: treat as a no-op,
            // matching the invariant that an expired entry must be
            // indistinguishable from nonexistent.
            return Ok(());
        };
        let key = keys::auth_state_key(&state.state);
        let json = serde_json::to_string(state)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, json, ttl as u64).await?;
        Ok(())
    }

    async fn get_auth_state(&self, state: &str) -> Result<Option<AuthState>> {
        let key = keys::auth_state_key(state);
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(&key).await?;
        let Some(json) = json else {
            return Ok(None);
        };
        let parsed: AuthState = serde_json::from_str(&json)?;
        // Defense in depth: Redis TTL should have expired this already, but
        // a clock race at the boundary must still read as absent.
        if parsed.is_expired() {
            return Ok(None);
        }
        Ok(Some(parsed))
    }

    async fn delete_auth_state(&self, state: &str) -> Result<()> {
        let key = keys::auth_state_key(state);
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(&key).await?;
        Ok(())
    }

    async fn blacklist_refresh_token(&self, hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let Some(ttl) = Self::ttl_secs_from(expires_at) else {
            return Ok(());
        };
        let key = keys::refresh_token_blacklist_key(hash);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, "1", ttl as u64).await?;
        Ok(())
    }

    async fn is_refresh_token_blacklisted(&self, hash: &str) -> Result<bool> {
        let key = keys::refresh_token_blacklist_key(hash);
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    async fn block_session(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let Some(ttl) = Self::ttl_secs_from(expires_at) else {
            return Ok(());
        };
        let key = keys::session_blocklist_key(session_id);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, "1", ttl as u64).await?;
        Ok(())
    }

    async fn is_session_blocked(&self, session_id: Uuid) -> Result<bool> {
        let key = keys::session_blocklist_key(session_id);
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    async fn add_session_to_user(&self, user_id: Uuid, session_id: Uuid, ttl: Duration) -> Result<()> {
        let key = keys::user_sessions_key(user_id);
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs() as i64;
        // SADD + EXPIRE as a single pipeline so the set never outlives its
        // TTL window due to a second write racing in between.
        let () = redis::pipe()
            .atomic()
            .sadd(&key, session_id.to_string())
            .expire(&key, ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_session_from_user(&self, user_id: Uuid, session_id: Uuid) -> Result<()> {
        let key = keys::user_sessions_key(user_id);
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem(&key, session_id.to_string()).await?;
        Ok(())
    }

    async fn get_user_session_count(&self, user_id: Uuid) -> Result<usize> {
        let key = keys::user_sessions_key(user_id);
        let mut conn = self.conn.clone();
        let count: usize = conn.scard(&key).await?;
        Ok(count)
    }

    async fn get_user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let key = keys::user_sessions_key(user_id);
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.smembers(&key).await?;
        Ok(raw
            .into_iter()
            .filter_map(|s| s.parse::<Uuid>().ok())
            .collect())
    }

    async fn is_session_in_user_set(&self, user_id: Uuid, session_id: Uuid) -> Result<bool> {
        let key = keys::user_sessions_key(user_id);
        let mut conn = self.conn.clone();
        let is_member: bool = conn.sismember(&key, session_id.to_string()).await?;
        Ok(is_member)
    }

    async fn acquire_lock(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let opts = redis::SetOptions::default()
            .with_expiration(redis::SetExpiry::EX(ttl.as_secs().max(1) as usize))
            .conditional_set(redis::ExistenceCheck::NX);
        let result: Option<String> = conn.set_options(key, value, opts).await?;
        Ok(result.is_some())
    }

    async fn release_lock(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release_lock_script
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        if deleted == 0 {
            warn!(key, "lock release attempted by non-owner or already-expired lock");
            return Err(Error::LockNotHeld(key.to_string()));
        }
        Ok(())
    }
}
