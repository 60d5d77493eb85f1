use axum::http::HeaderMap;

/// Best-effort client IP: the first hop of `X-Forwarded-For` if present
/// (this core sits behind a load balancer in every deployment it targets),
/// falling back to an empty string, which the auth service treats the same
/// as any other opaque audit field.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
