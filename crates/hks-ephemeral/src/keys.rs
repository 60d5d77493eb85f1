//! Key-naming conventions for the ephemeral tier.
//!
//! Centralizing these avoids the two-spellings-of-the-same-key bugs that
//! showed up in the source system.

use uuid::Uuid;

pub fn auth_state_key(state: &str) -> String {
    format!("auth_state:{state}")
}

pub fn refresh_token_blacklist_key(hash: &str) -> String {
    format!("refresh_token_blacklist:{hash}")
}

pub fn session_blocklist_key(session_id: Uuid) -> String {
    format!("session_blocklist:{session_id}")
}

pub fn user_sessions_key(user_id: Uuid) -> String {
    format!("user_sessions:{user_id}")
}

pub fn workspace_task_lock_key(workspace_id: Uuid) -> String {
    format!("workspace:{workspace_id}:task")
}

pub fn user_sessions_lock_key(user_id: Uuid) -> String {
    format!("user:{user_id}:sessions")
}
