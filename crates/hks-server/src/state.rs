use std::sync::Arc;

use hks_auth::{AuthService, KeyService};
use hks_workspace::WorkspaceLifecycleEngine;

/// Held by every HTTP handler. Every field is itself cheap to clone (the
/// services hold their own `Arc`-wrapped collaborators), so this is
/// `Clone` and passed by value as axum's `State` extractor expects.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub keys: Arc<KeyService>,
    pub lifecycle: Arc<WorkspaceLifecycleEngine>,
}
