use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hks_core::Error;
use serde_json::json;

/// Maps the shared error taxonomy onto HTTP status codes. Detail shown to
/// callers is the `Display` string as-is; the taxonomy itself already
/// redacts anything sensitive (blocklisted vs. revoked, etc. are collapsed
/// into `Unauthorized` upstream in the services).
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) | Error::Blocklisted | Error::PkceFailure => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            Error::LockNotHeld(_) => StatusCode::CONFLICT,
            Error::ProviderError { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::ProviderError { retryable: false, .. } => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Cache(_) | Error::Token(_) | Error::Serialization(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
