use std::collections::HashMap;

use hks_core::{OrganizationId, WorkspacePlan};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CreateWorkspaceRequest {
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub plan: WorkspacePlan,
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateWorkspaceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: Option<HashMap<String, Value>>,
}

/// The three operations `ExecuteOperation` may enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceOperation {
    Backup,
    Restore,
    Upgrade,
}
