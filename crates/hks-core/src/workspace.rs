use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{OrganizationId, UserId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspacePlan {
    Shared,
    Dedicated,
}

impl std::fmt::Display for WorkspacePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Shared => "shared",
            Self::Dedicated => "dedicated",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WorkspacePlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "dedicated" => Ok(Self::Dedicated),
            other => Err(format!("unknown workspace plan: {other}")),
        }
    }
}

/// Workspace lifecycle state. See `hks_workspace::lifecycle` for the
/// guarded transition table between these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Creating,
    Active,
    Updating,
    Suspended,
    Deleting,
    Failed,
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Updating => "updating",
            Self::Suspended => "suspended",
            Self::Deleting => "deleting",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WorkspaceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(Self::Creating),
            "active" => Ok(Self::Active),
            "updating" => Ok(Self::Updating),
            "suspended" => Ok(Self::Suspended),
            "deleting" => Ok(Self::Deleting),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown workspace status: {other}")),
        }
    }
}

/// The endpoint/API-server/status triple reported by the vCluster
/// collaborator (`GetVClusterInfo`), cached on the workspace row once
/// materialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub endpoint: Option<String>,
    pub api_server: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub plan: WorkspacePlan,
    pub plan_id: Option<String>,
    pub status: WorkspaceStatus,
    pub settings: HashMap<String, Value>,
    pub cluster_info: ClusterInfo,
    /// Materialized only when `status == Active`; stored encrypted at rest
    /// (encryption is a persistence-layer concern, not modeled here).
    pub kubeconfig: Option<String>,
    pub namespace: String,
    pub api_endpoint: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(organization_id: OrganizationId, name: String, description: Option<String>, plan: WorkspacePlan) -> Self {
        let id = WorkspaceId::new_v4();
        let now = Utc::now();
        Self {
            id,
            organization_id,
            name,
            description,
            plan,
            plan_id: None,
            status: WorkspaceStatus::Creating,
            settings: HashMap::new(),
            cluster_info: ClusterInfo::default(),
            kubeconfig: None,
            namespace: format!("vcluster-{id}"),
            api_endpoint: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Editor,
    Viewer,
}

impl MemberRole {
    /// Groups visible to the vCluster's OIDC integration for this role,
    /// each prefixed `workspace:`, most-privileged first.
    pub fn groups(&self) -> Vec<String> {
        let roles: &[&str] = match self {
            MemberRole::Admin => &["admin", "editor", "viewer"],
            MemberRole::Editor => &["editor", "viewer"],
            MemberRole::Viewer => &["viewer"],
        };
        roles.iter().map(|r| format!("workspace:{r}")).collect()
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown member role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMember {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub added_by: UserId,
    pub added_at: DateTime<Utc>,
}

/// A node in the vCluster's view of its underlying capacity, as reported
/// by `ListVClusterNodes`. Transient -- never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub ready: bool,
    pub cpu_capacity_millicores: u64,
    pub memory_capacity_bytes: u64,
}

/// Latest sample of a workspace's resource consumption, as reported by
/// `GetResourceMetrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub workspace_id: WorkspaceId,
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
    pub storage_bytes: u64,
    pub pod_count: u32,
    pub sampled_at: DateTime<Utc>,
}
