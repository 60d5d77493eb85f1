use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use hks_core::{Error, UserId};

use crate::state::AppState;

/// Extracts and verifies the bearer access token, yielding the caller's id.
/// Any handler that takes `AuthUser` as an argument requires a valid,
/// unexpired JWT -- axum rejects the request before the handler body runs
/// otherwise.
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing authorization header"))?;
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "expected a bearer token"))?;

        let claims = state
            .auth
            .validate_access_token(token)
            .map_err(|e: Error| match e {
                Error::Unauthorized(_) | Error::Token(_) => (StatusCode::UNAUTHORIZED, "invalid or expired token"),
                _ => (StatusCode::UNAUTHORIZED, "token verification failed"),
            })?;

        let user_id: UserId = claims
            .sub
            .parse()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "malformed subject claim"))?;
        Ok(AuthUser(user_id))
    }
}
