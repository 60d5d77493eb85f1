use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use hks_core::{
    ClusterInfo, Error, MemberRole, Result, SecurityEvent, SecurityLevel, Task, TaskType, UserId,
    Workspace, WorkspaceId, WorkspaceMember, WorkspaceStatus,
};
use hks_store::{Repository, WorkspaceFilter};
use serde_json::json;
use tracing::{info, warn};

use crate::cluster_client::VClusterClient;
use crate::helm_client::HelmClient;
use crate::types::{CreateWorkspaceRequest, UpdateWorkspaceRequest, WorkspaceOperation};

/// Legal `WorkspaceStatus` transitions per the state diagram. `deleting` has
/// no outgoing transition here: success removes the row outright, and
/// failure is recorded on the task, not the workspace.
fn guard_transition(from: WorkspaceStatus, to: WorkspaceStatus) -> Result<()> {
    use WorkspaceStatus::*;
    let allowed: &[WorkspaceStatus] = match from {
        Creating => &[Active, Deleting, Failed],
        Active => &[Updating, Suspended, Deleting, Failed],
        Updating => &[Active, Deleting, Failed],
        Suspended => &[Active, Deleting, Failed],
        Failed => &[Deleting],
        Deleting => &[],
    };
    if allowed.contains(&to) {
        Ok(())
    } else {
        Err(Error::PreconditionFailed(format!("illegal workspace transition {from} -> {to}")))
    }
}

/// Owns the workspace row and its state machine. Never talks to the cluster
/// inline on a request path for long operations -- it enqueues a task via
/// [`Repository::tasks`] and returns.
pub struct WorkspaceLifecycleEngine {
    repo: Repository,
    cluster: Arc<dyn VClusterClient>,
    helm: Arc<dyn HelmClient>,
}

impl WorkspaceLifecycleEngine {
    pub fn new(repo: Repository, cluster: Arc<dyn VClusterClient>, helm: Arc<dyn HelmClient>) -> Self {
        Self { repo, cluster, helm }
    }

    pub fn cluster(&self) -> &Arc<dyn VClusterClient> {
        &self.cluster
    }

    pub fn helm(&self) -> &Arc<dyn HelmClient> {
        &self.helm
    }

    pub async fn create_workspace(&self, req: CreateWorkspaceRequest) -> Result<(Workspace, Task)> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("workspace name must not be empty".into()));
        }

        let mut workspace = Workspace::new(req.organization_id, req.name, req.description, req.plan);
        workspace.plan_id = req.plan_id;
        self.repo.workspaces.create(&workspace).await?;

        let mut payload = HashMap::new();
        payload.insert("plan".to_string(), json!(workspace.plan.to_string()));
        let task = Task::new(workspace.id, TaskType::ProvisionVcluster, payload);
        self.repo.tasks.create(&task).await?;

        info!(workspace_id = %workspace.id, "workspace created, provisioning task enqueued");
        Ok((workspace, task))
    }

    /// Reads the row and, if `active`, best-effort overlays live vCluster
    /// status. A `VClusterClient` error here is logged and the persisted
    /// row returned as-is: failing a read for a display-only enrichment
    /// would be a worse default than a stale status field.
    pub async fn get_workspace(&self, id: WorkspaceId) -> Result<Workspace> {
        let mut workspace = self.repo.workspaces.get(id).await?;
        if workspace.status == WorkspaceStatus::Active {
            match self.cluster.get_vcluster_info(id).await {
                Ok(info) => {
                    workspace.cluster_info = ClusterInfo {
                        endpoint: info.endpoint,
                        api_server: info.api_server,
                        status: Some(format!("{:?}", info.status).to_lowercase()),
                    };
                }
                Err(e) => {
                    warn!(error = %e, workspace_id = %id, "live vCluster status overlay failed, returning persisted row");
                }
            }
        }
        Ok(workspace)
    }

    pub async fn list_workspaces(&self, filter: &WorkspaceFilter) -> Result<Vec<Workspace>> {
        self.repo.workspaces.list(filter).await
    }

    pub async fn update_workspace(&self, id: WorkspaceId, req: UpdateWorkspaceRequest) -> Result<Workspace> {
        self.repo
            .workspaces
            .update_fields(id, req.name.as_deref(), req.description.as_deref(), req.settings.as_ref())
            .await?;
        self.repo.workspaces.get(id).await
    }

    pub async fn delete_workspace(&self, id: WorkspaceId) -> Result<Task> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status == WorkspaceStatus::Deleting {
            return Err(Error::Conflict(format!("workspace {id} is already being deleted")));
        }
        guard_transition(workspace.status, WorkspaceStatus::Deleting)?;
        self.repo.workspaces.update_status(id, WorkspaceStatus::Deleting).await?;

        let task = Task::new(id, TaskType::DeleteVcluster, HashMap::new());
        self.repo.tasks.create(&task).await?;
        info!(workspace_id = %id, "workspace marked deleting, delete task enqueued");
        Ok(task)
    }

    pub async fn suspend(&self, id: WorkspaceId, reason: &str) -> Result<()> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(Error::PreconditionFailed(format!("workspace {id} is not active")));
        }
        self.cluster.scale_vcluster(id, 0).await?;
        self.repo.workspaces.update_status(id, WorkspaceStatus::Suspended).await?;
        self.record_event(None, "workspace_suspended", format!("workspace {id} suspended: {reason}"), SecurityLevel::Info).await;
        Ok(())
    }

    pub async fn reactivate(&self, id: WorkspaceId) -> Result<()> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status != WorkspaceStatus::Suspended {
            return Err(Error::PreconditionFailed(format!("workspace {id} is not suspended")));
        }
        self.cluster.scale_vcluster(id, 1).await?;
        self.repo.workspaces.update_status(id, WorkspaceStatus::Active).await?;
        self.record_event(None, "workspace_reactivated", format!("workspace {id} reactivated"), SecurityLevel::Info).await;
        Ok(())
    }

    pub async fn execute_operation(&self, id: WorkspaceId, op: WorkspaceOperation) -> Result<Task> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(Error::PreconditionFailed(format!("workspace {id} is not active")));
        }
        let task_type = match op {
            WorkspaceOperation::Backup => TaskType::Backup,
            WorkspaceOperation::Restore => TaskType::Restore,
            WorkspaceOperation::Upgrade => TaskType::Upgrade,
        };
        let task = Task::new(id, task_type, HashMap::new());
        self.repo.tasks.create(&task).await?;
        Ok(task)
    }

    pub async fn add_member(&self, workspace_id: WorkspaceId, user_id: UserId, role: MemberRole, added_by: UserId) -> Result<()> {
        let workspace = self.repo.workspaces.get(workspace_id).await?;
        let member = WorkspaceMember {
            workspace_id,
            user_id,
            role,
            added_by,
            added_at: Utc::now(),
        };
        self.repo.members.add(&member).await?;
        self.sync_oidc_members(workspace_id).await;
        info!(workspace_id = %workspace.id, user_id = %user_id, "member added");
        Ok(())
    }

    pub async fn remove_member(&self, workspace_id: WorkspaceId, user_id: UserId) -> Result<()> {
        let member = self.repo.members.get(workspace_id, user_id).await?;
        if member.role == MemberRole::Admin && self.repo.members.count_admins(workspace_id).await? <= 1 {
            return Err(Error::PreconditionFailed("cannot remove the last admin of a workspace".into()));
        }
        self.repo.members.remove(workspace_id, user_id).await?;
        self.sync_oidc_members(workspace_id).await;
        Ok(())
    }

    pub async fn list_members(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceMember>> {
        self.repo.members.list_for_workspace(workspace_id).await
    }

    /// Membership changes push the full member list to the vCluster's OIDC
    /// config; there is no incremental diff on the cluster side.
    async fn sync_oidc_members(&self, workspace_id: WorkspaceId) {
        let members = match self.repo.members.list_for_workspace(workspace_id).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, workspace_id = %workspace_id, "failed to load members for OIDC sync");
                return;
            }
        };
        let user_groups: Vec<(String, Vec<String>)> =
            members.into_iter().map(|m| (m.user_id.to_string(), m.role.groups())).collect();
        if let Err(e) = self.cluster.update_oidc_config(workspace_id, user_groups).await {
            warn!(error = %e, workspace_id = %workspace_id, "OIDC config update failed");
        }
    }

    pub async fn get_kubeconfig(&self, id: WorkspaceId) -> Result<String> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(Error::PreconditionFailed(format!("workspace {id} is not active")));
        }
        if let Some(kubeconfig) = workspace.kubeconfig {
            return Ok(kubeconfig);
        }
        let info = self.cluster.get_vcluster_info(id).await?;
        let kubeconfig = info
            .kubeconfig
            .ok_or_else(|| Error::provider("vCluster did not return a kubeconfig", false))?;
        self.repo.workspaces.set_kubeconfig(id, &kubeconfig).await?;
        Ok(kubeconfig)
    }

    pub async fn get_nodes(&self, id: WorkspaceId) -> Result<Vec<hks_core::Node>> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(Error::PreconditionFailed(format!("workspace {id} is not active")));
        }
        self.cluster.list_vcluster_nodes(id).await
    }

    pub async fn scale_deployment(&self, id: WorkspaceId, deployment: &str, replicas: u32) -> Result<()> {
        let workspace = self.repo.workspaces.get(id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(Error::PreconditionFailed(format!("workspace {id} is not active")));
        }
        self.cluster.scale_vcluster_deployment(id, deployment, replicas).await
    }

    async fn record_event(&self, user_id: Option<UserId>, event_type: impl Into<String>, description: impl Into<String>, level: SecurityLevel) {
        let event = SecurityEvent::new(user_id, event_type, description, level);
        if let Err(e) = self.repo.security_events.record(&event).await {
            warn!(error = %e, "failed to record security event");
        }
    }
}
