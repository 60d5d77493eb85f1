use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, UserId};

/// Ephemeral-tier record created by `GetAuthURL` and consumed by
/// `HandleCallback`. Lifetime <= 10 minutes; stored only in the ephemeral
/// tier keyed by `state`, with TTL = `expires_at - now`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub state: String,
    pub provider: String,
    pub redirect_url: String,
    pub code_challenge: Option<String>,
    pub client_ip: String,
    pub user_agent: String,
    /// Carried faithfully but not acted upon by the core: the product
    /// meaning of sign-up vs. login is undefined at this layer.
    pub is_sign_up: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthState {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A user's authenticated session. The plaintext refresh token is never
/// persisted -- only `refresh_token_hash` (and the `salt` used to compute
/// it) via the token-hash service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub refresh_token_hash: String,
    pub refresh_token_selector: String,
    pub salt: String,
    pub device_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    /// A session must not authenticate if revoked or past expiry.
    pub fn is_usable(&self) -> bool {
        !self.revoked && Utc::now() < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown security level: {other}")),
        }
    }
}

/// Append-only audit record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: uuid::Uuid,
    pub user_id: Option<UserId>,
    pub event_type: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub level: SecurityLevel,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(
        user_id: Option<UserId>,
        event_type: impl Into<String>,
        description: impl Into<String>,
        level: SecurityLevel,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            user_id,
            event_type: event_type.into(),
            description: description.into(),
            ip_address: None,
            user_agent: None,
            level,
            created_at: Utc::now(),
        }
    }

    pub fn with_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Claims carried by an access or workspace JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub org_ids: Vec<String>,
    pub iat: usize,
    pub exp: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}
