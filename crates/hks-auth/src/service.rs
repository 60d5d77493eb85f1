use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use hks_core::{
    AccessClaims, Error, MemberRole, Result, Session, SessionId, UserId, WorkspaceId,
};
use hks_ephemeral::{keys as ekeys, EphemeralStore};
use hks_store::Repository;
use tracing::{info, warn};

use crate::hash::TokenHasher;
use crate::keys::{KeyService, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, WORKSPACE_TOKEN_TTL};
use crate::oauth::{AuthUrlParams, OAuthProvider};
use crate::tokens::{new_refresh_token, random_url_safe_token, selector_of, verify_pkce};
use crate::types::{AuthResponse, GetAuthUrlRequest, HandleCallbackRequest};
use hks_core::{AuthState, SecurityEvent, SecurityLevel};

const AUTH_STATE_TTL: chrono::Duration = chrono::Duration::minutes(10);
const SESSION_LOCK_TTL: StdDuration = StdDuration::from_secs(5);

/// OAuth login, PKCE, JWT issuance, refresh rotation, and revocation.
pub struct AuthService {
    repo: Repository,
    keys: Arc<KeyService>,
    hasher: TokenHasher,
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
    max_sessions_per_user: usize,
}

impl AuthService {
    pub fn new(
        repo: Repository,
        keys: Arc<KeyService>,
        providers: HashMap<String, Arc<dyn OAuthProvider>>,
        max_sessions_per_user: usize,
    ) -> Self {
        Self {
            repo,
            keys,
            hasher: TokenHasher::new(),
            providers,
            max_sessions_per_user,
        }
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn OAuthProvider>> {
        self.providers
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown provider: {name}")))
    }

    pub async fn get_auth_url(&self, req: GetAuthUrlRequest) -> Result<(String, String)> {
        let provider = self.provider(&req.provider)?;
        let state = random_url_safe_token(32);
        let now = Utc::now();
        let auth_state = AuthState {
            state: state.clone(),
            provider: req.provider.clone(),
            redirect_url: req.redirect_url.clone(),
            code_challenge: req.code_challenge.clone(),
            client_ip: String::new(),
            user_agent: String::new(),
            is_sign_up: req.is_sign_up,
            expires_at: now + AUTH_STATE_TTL,
            created_at: now,
        };
        self.repo.ephemeral.store_auth_state(&auth_state).await?;

        let url = provider.auth_url(
            &state,
            AuthUrlParams {
                redirect_url: &req.redirect_url,
                code_challenge: req.code_challenge.as_deref(),
            },
        );
        Ok((url, state))
    }

    /// Exposed standalone for testability and for `handle_callback`'s
    /// internal use.
    pub async fn verify_auth_state(&self, state: &str) -> Result<AuthState> {
        let auth_state = self
            .repo
            .ephemeral
            .get_auth_state(state)
            .await?
            .ok_or_else(|| Error::InvalidInput("invalid or expired auth state".into()))?;
        if auth_state.is_expired() {
            return Err(Error::InvalidInput("invalid or expired auth state".into()));
        }
        Ok(auth_state)
    }

    /// Exposed standalone for testability.
    pub fn verify_pkce(&self, challenge: &str, verifier: &str) -> Result<()> {
        if verify_pkce(challenge, verifier) {
            Ok(())
        } else {
            Err(Error::PkceFailure)
        }
    }

    pub async fn handle_callback(
        &self,
        req: HandleCallbackRequest,
        client_ip: &str,
        user_agent: &str,
    ) -> Result<AuthResponse> {
        let auth_state = self.verify_auth_state(&req.state).await?;

        if let Some(challenge) = &auth_state.code_challenge {
            let verifier = req
                .code_verifier
                .as_deref()
                .ok_or(Error::PkceFailure)?;
            self.verify_pkce(challenge, verifier)?;
        }

        let provider = self.provider(&req.provider)?;
        let provider_token = provider.exchange(&req.code, &auth_state.redirect_url).await?;
        let info = provider.user_info(&provider_token).await?;

        let user = match self.repo.users.get_by_external_id(&info.id, &req.provider).await? {
            Some(mut existing) => {
                existing.touch_login();
                self.repo.users.touch_last_login(existing.id, Utc::now()).await?;
                existing
            }
            None => {
                let created = hks_core::User::new(info.id.clone(), req.provider.clone(), info.email.clone(), info.name.clone(), info.picture.clone());
                self.repo.users.create(&created).await?;
                self.record_event(
                    Some(created.id),
                    "user_created",
                    format!("user created via {}", req.provider),
                    SecurityLevel::Info,
                    client_ip,
                    user_agent,
                )
                .await;
                created
            }
        };

        let response = self.mint_session(user.id, client_ip, user_agent).await?;

        self.repo.ephemeral.delete_auth_state(&req.state).await?;
        self.record_event(
            Some(user.id),
            "login_success",
            format!("login via {}", req.provider),
            SecurityLevel::Info,
            client_ip,
            user_agent,
        )
        .await;

        Ok(response)
    }

    /// Mints an access/refresh pair, persists the session, registers it in
    /// the per-user session set, and enforces the session-limit policy
    /// under a distributed lock.
    async fn mint_session(&self, user_id: UserId, ip: &str, user_agent: &str) -> Result<AuthResponse> {
        let lock_key = ekeys::user_sessions_lock_key(user_id);
        let lock_value = uuid::Uuid::new_v4().to_string();
        let acquired = self
            .repo
            .ephemeral
            .acquire_lock(&lock_key, &lock_value, SESSION_LOCK_TTL)
            .await?;
        if !acquired {
            return Err(Error::Timeout(format!("could not acquire session lock for user {user_id}")));
        }

        let result = self.mint_session_locked(user_id, ip, user_agent).await;

        if let Err(e) = self.repo.ephemeral.release_lock(&lock_key, &lock_value).await {
            warn!(error = %e, user_id = %user_id, "failed to release session lock");
        }

        result
    }

    async fn mint_session_locked(&self, user_id: UserId, ip: &str, user_agent: &str) -> Result<AuthResponse> {
        let count = self.repo.ephemeral.get_user_session_count(user_id).await?;
        if count >= self.max_sessions_per_user {
            let existing = self.repo.sessions.list_for_user(user_id).await?;
            if let Some(oldest) = existing.into_iter().min_by_key(|s| s.created_at) {
                info!(user_id = %user_id, session_id = %oldest.id, "evicting oldest session over the session cap");
                let oldest_id = oldest.id;
                self.revoke_session_internal(&oldest).await?;
                self.record_event(
                    Some(user_id),
                    "session_revoked",
                    format!("session {oldest_id} evicted over session cap"),
                    SecurityLevel::Info,
                    ip,
                    user_agent,
                )
                .await;
            }
        }

        let user = self.repo.users.get_by_id(user_id).await?;
        let now = Utc::now();
        let (refresh_token, selector) = new_refresh_token();
        let (hash_hex, salt_hex) = self.hasher.hash(&refresh_token);

        let session = Session {
            id: SessionId::new_v4(),
            user_id,
            refresh_token_hash: hash_hex,
            refresh_token_selector: selector,
            salt: salt_hex,
            device_id: None,
            ip_address: ip.to_string(),
            user_agent: user_agent.to_string(),
            expires_at: now + REFRESH_TOKEN_TTL,
            created_at: now,
            last_used_at: now,
            revoked: false,
        };
        self.repo.sessions.create(&session).await?;
        self.repo
            .ephemeral
            .add_session_to_user(user_id, session.id, std_duration(REFRESH_TOKEN_TTL))
            .await?;

        let access_token = self.sign_access_token(&user, &[])?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: ACCESS_TOKEN_TTL.num_seconds(),
            user_id: user.id.to_string(),
        })
    }

    fn sign_access_token(&self, user: &hks_core::User, org_ids: &[String]) -> Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            provider: user.provider.clone(),
            org_ids: org_ids.to_vec(),
            iat: now.timestamp() as usize,
            exp: (now + ACCESS_TOKEN_TTL).timestamp() as usize,
            workspace_id: None,
            groups: None,
        };
        self.keys.sign(&claims)
    }

    pub async fn refresh_token(&self, refresh_token: &str, ip: &str, user_agent: &str) -> Result<AuthResponse> {
        let selector = selector_of(refresh_token)
            .ok_or_else(|| Error::InvalidInput("malformed refresh token".into()))?;

        let session = self
            .repo
            .sessions
            .get_by_selector(selector)
            .await?
            .ok_or_else(|| Error::Unauthorized("invalid refresh token".into()))?;

        if self.repo.ephemeral.is_refresh_token_blacklisted(&session.refresh_token_hash).await? {
            return Err(Error::Blocklisted);
        }

        if !self.hasher.verify(refresh_token, &session.refresh_token_hash, &session.salt) {
            return Err(Error::Unauthorized("invalid refresh token".into()));
        }

        if !session.is_usable() {
            return Err(Error::Unauthorized("session expired or revoked".into()));
        }

        let user = self.repo.users.get_by_id(session.user_id).await?;
        let now = Utc::now();
        let (new_token, new_selector) = new_refresh_token();
        let (new_hash, new_salt) = self.hasher.hash(&new_token);

        if let Err(e) = self
            .repo
            .ephemeral
            .blacklist_refresh_token(&session.refresh_token_hash, session.expires_at)
            .await
        {
            warn!(error = %e, session_id = %session.id, "failed to blacklist rotated refresh token");
        }

        // Rotation replaces the session rather than rewriting it in place:
        // the old row keeps its old selector/hash/salt (just marked
        // revoked) so a replayed old token is still found by selector and
        // caught by the blocklist check above, instead of falling through
        // to a plain "invalid refresh token".
        self.repo.sessions.mark_revoked(session.id).await?;

        let new_session = Session {
            id: SessionId::new_v4(),
            user_id: session.user_id,
            refresh_token_hash: new_hash,
            refresh_token_selector: new_selector,
            salt: new_salt,
            device_id: session.device_id.clone(),
            ip_address: ip.to_string(),
            user_agent: user_agent.to_string(),
            expires_at: now + REFRESH_TOKEN_TTL,
            created_at: now,
            last_used_at: now,
            revoked: false,
        };
        self.repo.sessions.create(&new_session).await?;

        self.repo
            .ephemeral
            .remove_session_from_user(session.user_id, session.id)
            .await?;
        self.repo
            .ephemeral
            .add_session_to_user(session.user_id, new_session.id, std_duration(REFRESH_TOKEN_TTL))
            .await?;

        let access_token = self.sign_access_token(&user, &[])?;

        self.record_event(
            Some(user.id),
            "token_refreshed",
            "refresh token rotated",
            SecurityLevel::Info,
            ip,
            user_agent,
        )
        .await;

        Ok(AuthResponse {
            access_token,
            refresh_token: new_token,
            token_type: "Bearer".to_string(),
            expires_in: ACCESS_TOKEN_TTL.num_seconds(),
            user_id: user.id.to_string(),
        })
    }

    pub async fn revoke_session(&self, user_id: UserId, session_id: SessionId) -> Result<()> {
        let session = self.repo.sessions.get_by_id(session_id).await?;
        if session.user_id != user_id {
            return Err(Error::Forbidden("session does not belong to caller".into()));
        }
        self.revoke_session_internal(&session).await?;
        self.record_event(
            Some(user_id),
            "session_revoked",
            format!("session {session_id} revoked"),
            SecurityLevel::Info,
            "",
            "",
        )
        .await;
        Ok(())
    }

    async fn revoke_session_internal(&self, session: &Session) -> Result<()> {
        self.repo
            .ephemeral
            .blacklist_refresh_token(&session.refresh_token_hash, session.expires_at)
            .await?;
        self.repo.sessions.delete(session.id).await?;
        self.repo
            .ephemeral
            .remove_session_from_user(session.user_id, session.id)
            .await?;
        Ok(())
    }

    pub async fn revoke_all_sessions(&self, user_id: UserId, except: Option<SessionId>) -> Result<()> {
        let sessions = self.repo.sessions.list_for_user(user_id).await?;
        for session in &sessions {
            if Some(session.id) == except {
                continue;
            }
            self.revoke_session_internal(session).await?;
        }
        self.record_event(
            Some(user_id),
            "all_sessions_revoked",
            "all sessions revoked",
            SecurityLevel::Warning,
            "",
            "",
        )
        .await;
        Ok(())
    }

    pub fn validate_access_token(&self, jwt: &str) -> Result<AccessClaims> {
        self.keys.verify(jwt)
    }

    pub async fn generate_workspace_token(&self, user_id: UserId, workspace_id: WorkspaceId) -> Result<String> {
        let member = self
            .repo
            .members
            .get(workspace_id, user_id)
            .await
            .map_err(|_| Error::Forbidden(format!("user {user_id} is not a member of workspace {workspace_id}")))?;

        let user = self.repo.users.get_by_id(user_id).await?;
        let groups: Vec<String> = member_groups(member.role);

        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            provider: user.provider.clone(),
            org_ids: vec![],
            iat: now.timestamp() as usize,
            exp: (now + WORKSPACE_TOKEN_TTL).timestamp() as usize,
            workspace_id: Some(workspace_id.to_string()),
            groups: Some(groups),
        };
        self.keys.sign(&claims)
    }

    async fn record_event(
        &self,
        user_id: Option<UserId>,
        event_type: impl Into<String>,
        description: impl Into<String>,
        level: SecurityLevel,
        ip: &str,
        user_agent: &str,
    ) {
        let event = SecurityEvent::new(user_id, event_type, description, level).with_client(ip, user_agent);
        if let Err(e) = self.repo.security_events.record(&event).await {
            warn!(error = %e, "failed to record security event");
        }
    }
}

fn member_groups(role: MemberRole) -> Vec<String> {
    role.groups()
}

fn std_duration(d: chrono::Duration) -> StdDuration {
    d.to_std().unwrap_or(StdDuration::from_secs(0))
}
