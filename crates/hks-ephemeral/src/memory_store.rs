//! In-memory [`EphemeralStore`] double, for unit tests and local
//! development without a Redis instance.
//!
//! TTLs are enforced lazily on read (there is no background expiry thread),
//! which is sufficient to make the "expired == absent" invariant hold for
//! every method here.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hks_core::{AuthState, Error, Result};
use uuid::Uuid;

use crate::store::EphemeralStore;

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Default)]
pub struct MemoryEphemeralStore {
    auth_states: DashMap<String, Expiring<AuthState>>,
    refresh_blacklist: DashMap<String, Expiring<()>>,
    session_blocklist: DashMap<Uuid, Expiring<()>>,
    user_sessions: DashMap<Uuid, Expiring<HashSet<Uuid>>>,
    locks: DashMap<String, String>,
}

impl MemoryEphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ttl_from(expires_at: DateTime<Utc>) -> Option<Duration> {
        let secs = (expires_at - Utc::now()).num_seconds();
        if secs <= 0 {
            None
        } else {
            Some(Duration::from_secs(secs as u64))
        }
    }
}

#[async_trait]
impl EphemeralStore for MemoryEphemeralStore {
    async fn store_auth_state(&self, state: &AuthState) -> Result<()> {
        let Some(ttl) = Self::ttl_from(state.expires_at) else {
            return Ok(());
        };
        self.auth_states
            .insert(state.state.clone(), Expiring::new(state.clone(), ttl));
        Ok(())
    }

    async fn get_auth_state(&self, state: &str) -> Result<Option<AuthState>> {
        match self.auth_states.get(state) {
            Some(entry) if entry.is_live() && !entry.value.is_expired() => Ok(Some(entry.value.clone())),
            Some(_) => {
                drop(self.auth_states.remove(state));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_auth_state(&self, state: &str) -> Result<()> {
        self.auth_states.remove(state);
        Ok(())
    }

    async fn blacklist_refresh_token(&self, hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let Some(ttl) = Self::ttl_from(expires_at) else {
            return Ok(());
        };
        self.refresh_blacklist.insert(hash.to_string(), Expiring::new((), ttl));
        Ok(())
    }

    async fn is_refresh_token_blacklisted(&self, hash: &str) -> Result<bool> {
        Ok(self.refresh_blacklist.get(hash).map(|e| e.is_live()).unwrap_or(false))
    }

    async fn block_session(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let Some(ttl) = Self::ttl_from(expires_at) else {
            return Ok(());
        };
        self.session_blocklist.insert(session_id, Expiring::new((), ttl));
        Ok(())
    }

    async fn is_session_blocked(&self, session_id: Uuid) -> Result<bool> {
        Ok(self
            .session_blocklist
            .get(&session_id)
            .map(|e| e.is_live())
            .unwrap_or(false))
    }

    async fn add_session_to_user(&self, user_id: Uuid, session_id: Uuid, ttl: Duration) -> Result<()> {
        let mut entry = self
            .user_sessions
            .entry(user_id)
            .or_insert_with(|| Expiring::new(HashSet::new(), ttl));
        entry.value.insert(session_id);
        entry.expires_at = Instant::now() + ttl;
        Ok(())
    }

    async fn remove_session_from_user(&self, user_id: Uuid, session_id: Uuid) -> Result<()> {
        if let Some(mut entry) = self.user_sessions.get_mut(&user_id) {
            entry.value.remove(&session_id);
        }
        Ok(())
    }

    async fn get_user_session_count(&self, user_id: Uuid) -> Result<usize> {
        Ok(self
            .user_sessions
            .get(&user_id)
            .filter(|e| e.is_live())
            .map(|e| e.value.len())
            .unwrap_or(0))
    }

    async fn get_user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .user_sessions
            .get(&user_id)
            .filter(|e| e.is_live())
            .map(|e| e.value.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn is_session_in_user_set(&self, user_id: Uuid, session_id: Uuid) -> Result<bool> {
        Ok(self
            .user_sessions
            .get(&user_id)
            .filter(|e| e.is_live())
            .map(|e| e.value.contains(&session_id))
            .unwrap_or(false))
    }

    async fn acquire_lock(&self, key: &str, value: &str, _ttl: Duration) -> Result<bool> {
        match self.locks.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(true)
            }
        }
    }

    async fn release_lock(&self, key: &str, value: &str) -> Result<()> {
        match self.locks.get(key).map(|v| v.clone()) {
            Some(current) if current == value => {
                self.locks.remove(key);
                Ok(())
            }
            _ => Err(Error::LockNotHeld(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hks_core::AuthState;

    fn state(token: &str, ttl_secs: i64) -> AuthState {
        AuthState {
            state: token.to_string(),
            provider: "google".to_string(),
            redirect_url: "https://app.example/cb".to_string(),
            code_challenge: None,
            client_ip: "1.2.3.4".to_string(),
            user_agent: "UA".to_string(),
            is_sign_up: false,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn auth_state_roundtrip() {
        let store = MemoryEphemeralStore::new();
        store.store_auth_state(&state("s1", 600)).await.unwrap();
        let got = store.get_auth_state("s1").await.unwrap();
        assert!(got.is_some());
        assert!(!got.unwrap().is_sign_up);
    }

    #[tokio::test]
    async fn expired_auth_state_is_absent() {
        let store = MemoryEphemeralStore::new();
        store.store_auth_state(&state("s2", -5)).await.unwrap();
        assert!(store.get_auth_state("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consumed_auth_state_is_absent() {
        let store = MemoryEphemeralStore::new();
        store.store_auth_state(&state("s3", 600)).await.unwrap();
        store.delete_auth_state("s3").await.unwrap();
        assert!(store.get_auth_state("s3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_release_by_non_owner_fails_and_keeps_lock() {
        let store = MemoryEphemeralStore::new();
        assert!(store.acquire_lock("k", "owner-1", Duration::from_secs(30)).await.unwrap());
        let err = store.release_lock("k", "owner-2").await.unwrap_err();
        assert!(matches!(err, Error::LockNotHeld(_)));
        // Lock is still held by owner-1.
        assert!(!store.acquire_lock("k", "owner-3", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn session_set_tracks_membership() {
        let store = MemoryEphemeralStore::new();
        let user = Uuid::new_v4();
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        store.add_session_to_user(user, s1, Duration::from_secs(60)).await.unwrap();
        store.add_session_to_user(user, s2, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get_user_session_count(user).await.unwrap(), 2);
        store.remove_session_from_user(user, s1).await.unwrap();
        assert_eq!(store.get_user_session_count(user).await.unwrap(), 1);
        assert!(store.is_session_in_user_set(user, s2).await.unwrap());
    }
}
