//! Trait abstraction over the ephemeral tier.
//!
//! Mirrors the `SessionStore` abstraction pattern: a single trait lets the
//! construction root swap a Redis-backed implementation for an in-memory
//! double in tests, without the rest of the system knowing the difference.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hks_core::{AuthState, Result};
use uuid::Uuid;

/// All operations are retryable and idempotent, except the atomic counter
/// operations (`add_session_to_user` et al.), which are documented as such.
#[async_trait]
pub trait EphemeralStore: Send + Sync + 'static {
    async fn store_auth_state(&self, state: &AuthState) -> Result<()>;
    async fn get_auth_state(&self, state: &str) -> Result<Option<AuthState>>;
    async fn delete_auth_state(&self, state: &str) -> Result<()>;

    async fn blacklist_refresh_token(&self, hash: &str, expires_at: DateTime<Utc>) -> Result<()>;
    async fn is_refresh_token_blacklisted(&self, hash: &str) -> Result<bool>;

    async fn block_session(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<()>;
    async fn is_session_blocked(&self, session_id: Uuid) -> Result<bool>;

    /// Atomically add `session_id` to the user's session set and refresh
    /// the set's TTL to `ttl`.
    async fn add_session_to_user(&self, user_id: Uuid, session_id: Uuid, ttl: Duration) -> Result<()>;
    async fn remove_session_from_user(&self, user_id: Uuid, session_id: Uuid) -> Result<()>;
    async fn get_user_session_count(&self, user_id: Uuid) -> Result<usize>;
    async fn get_user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;
    async fn is_session_in_user_set(&self, user_id: Uuid, session_id: Uuid) -> Result<bool>;

    /// `SET key value NX EX ttl`. Returns `true` if the lock was acquired.
    async fn acquire_lock(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
    /// Atomic compare-and-delete. Returns `Error::LockNotHeld` (never
    /// deletes another owner's lock) if the stored value does not match
    /// `value`.
    async fn release_lock(&self, key: &str, value: &str) -> Result<()>;
}
