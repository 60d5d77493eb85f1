use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use hks_auth::{GetAuthUrlRequest, HandleCallbackRequest};
use hks_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::middleware::AuthUser;
use crate::http::request_meta::{client_ip, user_agent};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider/login", get(start_login))
        .route("/auth/:provider/callback", get(callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/sessions/:session_id/revoke", post(revoke_session))
        .route("/auth/sessions/revoke-all", post(revoke_all_sessions))
        .route("/.well-known/jwks.json", get(jwks))
}

#[derive(Deserialize)]
struct LoginQuery {
    redirect_url: String,
    code_challenge: Option<String>,
    #[serde(default)]
    is_sign_up: bool,
}

#[derive(Serialize)]
struct LoginResponse {
    auth_url: String,
    state: String,
}

async fn start_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (auth_url, login_state) = state
        .auth
        .get_auth_url(GetAuthUrlRequest {
            provider,
            redirect_url: query.redirect_url,
            code_challenge: query.code_challenge,
            is_sign_up: query.is_sign_up,
        })
        .await?;
    Ok(Json(LoginResponse { auth_url, state: login_state }))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: String,
    state: String,
    code_verifier: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<Json<hks_auth::AuthResponse>, ApiError> {
    let response = state
        .auth
        .handle_callback(
            HandleCallbackRequest {
                provider,
                code: query.code,
                state: query.state,
                code_verifier: query.code_verifier,
            },
            &client_ip(&headers),
            &user_agent(&headers),
        )
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<hks_auth::AuthResponse>, ApiError> {
    let response = state
        .auth
        .refresh_token(&body.refresh_token, &client_ip(&headers), &user_agent(&headers))
        .await?;
    Ok(Json(response))
}

async fn revoke_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Value>, ApiError> {
    state.auth.revoke_session(user_id, session_id).await?;
    Ok(Json(serde_json::json!({ "revoked": true })))
}

async fn revoke_all_sessions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    state.auth.revoke_all_sessions(user_id, None).await?;
    Ok(Json(serde_json::json!({ "revoked": true })))
}

/// Served unauthenticated: downstream vCluster OIDC integrations fetch this
/// to verify access tokens this core issues.
async fn jwks(State(state): State<AppState>) -> Json<Value> {
    Json(state.keys.jwks())
}
