use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GetAuthUrlRequest {
    pub provider: String,
    pub redirect_url: String,
    /// PKCE S256 challenge, when the caller opts into PKCE.
    pub code_challenge: Option<String>,
    pub is_sign_up: bool,
}

#[derive(Debug, Clone)]
pub struct HandleCallbackRequest {
    pub provider: String,
    pub code: String,
    pub state: String,
    /// Required when the matching `AuthState` carried a `code_challenge`.
    pub code_verifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: String,
}
