use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A user identity, created on first successful OAuth callback for an
/// unknown `(external_id, provider)` pair. Never destroyed by the core;
/// soft-deletion is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: String,
    pub provider: String,
    pub email: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(external_id: String, provider: String, email: String, display_name: String, avatar: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new_v4(),
            external_id,
            provider,
            email,
            display_name,
            avatar,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn touch_login(&mut self) {
        let now = Utc::now();
        self.last_login_at = Some(now);
        self.updated_at = now;
    }
}
