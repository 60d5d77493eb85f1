pub mod auth;
pub mod error;
pub mod middleware;
pub mod request_meta;
pub mod workspaces;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(workspaces::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
