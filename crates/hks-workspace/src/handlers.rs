use std::sync::Arc;

use async_trait::async_trait;
use hks_core::{Error, Result, SecurityEvent, SecurityLevel, Task, WorkspaceStatus};
use hks_store::Repository;
use serde_json::json;
use tracing::{info, warn};

use crate::cluster_client::VClusterClient;
use crate::helm_client::HelmClient;

const OBSERVABILITY_RELEASE: &str = "hks-observability-agents";
const OBSERVABILITY_CHART: &str = "hks/observability-agents";

/// A pure function of `(task, collaborators)` returning error -- the engine
/// never inspects a handler's internals, only its outcome. Handlers must
/// check `task.cancelling` at safe points and bail out with
/// `Error::Internal("cancelled")` if set.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &Task) -> Result<()>;
}

pub struct ProvisionVclusterHandler {
    repo: Repository,
    cluster: Arc<dyn VClusterClient>,
    helm: Arc<dyn HelmClient>,
}

impl ProvisionVclusterHandler {
    pub fn new(repo: Repository, cluster: Arc<dyn VClusterClient>, helm: Arc<dyn HelmClient>) -> Self {
        Self { repo, cluster, helm }
    }
}

impl ProvisionVclusterHandler {
    /// Best-effort rollback after a required provisioning step fails:
    /// attempts `DeleteVCluster` and marks the workspace `failed` for
    /// operator intervention. Always returns the original error.
    async fn rollback(&self, workspace_id: hks_core::WorkspaceId, engine_err: Error) -> Result<()> {
        warn!(workspace_id = %workspace_id, error = %engine_err, "provisioning failed, attempting rollback");
        if let Err(rollback_err) = self.cluster.delete_vcluster(workspace_id).await {
            warn!(workspace_id = %workspace_id, error = %rollback_err, "rollback DeleteVCluster also failed");
        }
        if let Err(e) = self.repo.workspaces.update_status(workspace_id, WorkspaceStatus::Failed).await {
            warn!(workspace_id = %workspace_id, error = %e, "failed to mark workspace failed after rollback");
        }
        Err(engine_err)
    }
}

#[async_trait]
impl TaskHandler for ProvisionVclusterHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        let workspace_id = task.workspace_id;
        let workspace = self.repo.workspaces.get(workspace_id).await?;

        if let Err(e) = self.cluster.create_vcluster(workspace_id, workspace.plan).await {
            return self.rollback(workspace_id, e).await;
        }
        self.repo.tasks.update_progress(task.id, 20, Some("vcluster created")).await.ok();

        if let Err(e) = self.cluster.wait_for_vcluster_ready(workspace_id).await {
            return self.rollback(workspace_id, e).await;
        }
        self.repo.tasks.update_progress(task.id, 50, Some("vcluster ready")).await.ok();

        if let Err(e) = self.cluster.configure_oidc(workspace_id).await {
            return self.rollback(workspace_id, e).await;
        }
        self.repo.tasks.update_progress(task.id, 70, Some("oidc configured")).await.ok();

        if let Err(e) = self.cluster.apply_resource_quotas(workspace_id, workspace.plan).await {
            return self.rollback(workspace_id, e).await;
        }
        self.repo.tasks.update_progress(task.id, 85, Some("quotas applied")).await.ok();

        if workspace.plan == hks_core::WorkspacePlan::Shared {
            let mut values = std::collections::HashMap::new();
            values.insert("tenant".to_string(), json!({ "workspaceId": workspace_id.to_string() }));
            if let Err(e) = self
                .helm
                .install_or_upgrade(OBSERVABILITY_RELEASE, OBSERVABILITY_CHART, &workspace.namespace, values)
                .await
            {
                warn!(workspace_id = %workspace_id, error = %e, "helm install of observability agents failed, continuing");
                let event = SecurityEvent::new(
                    None,
                    "helm_install_failed",
                    format!("observability agent install failed for workspace {workspace_id}: {e}"),
                    SecurityLevel::Warning,
                );
                self.repo.security_events.record(&event).await.ok();
            }
        }

        self.repo.workspaces.update_status(workspace_id, WorkspaceStatus::Active).await?;
        self.repo.tasks.update_progress(task.id, 100, Some("workspace active")).await.ok();
        info!(workspace_id = %workspace_id, "workspace provisioned");
        Ok(())
    }
}

pub struct DeleteVclusterHandler {
    repo: Repository,
    cluster: Arc<dyn VClusterClient>,
}

impl DeleteVclusterHandler {
    pub fn new(repo: Repository, cluster: Arc<dyn VClusterClient>) -> Self {
        Self { repo, cluster }
    }
}

#[async_trait]
impl TaskHandler for DeleteVclusterHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        let workspace_id = task.workspace_id;
        self.cluster.delete_vcluster(workspace_id).await?;
        self.cluster.wait_for_vcluster_deleted(workspace_id).await?;
        self.repo.workspaces.delete(workspace_id).await?;
        info!(workspace_id = %workspace_id, "workspace deleted");
        Ok(())
    }
}

pub struct UpgradeHandler {
    repo: Repository,
    cluster: Arc<dyn VClusterClient>,
}

impl UpgradeHandler {
    pub fn new(repo: Repository, cluster: Arc<dyn VClusterClient>) -> Self {
        Self { repo, cluster }
    }
}

#[async_trait]
impl TaskHandler for UpgradeHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        let workspace_id = task.workspace_id;
        let workspace = self.repo.workspaces.get(workspace_id).await?;
        self.repo.workspaces.update_status(workspace_id, WorkspaceStatus::Updating).await?;
        let result = self.cluster.apply_resource_quotas(workspace_id, workspace.plan).await;
        let next = if result.is_ok() { WorkspaceStatus::Active } else { WorkspaceStatus::Failed };
        self.repo.workspaces.update_status(workspace_id, next).await?;
        result
    }
}

/// Backup and restore have no dedicated `VClusterClient` methods in this
/// core -- they dispatch through the same resource-quota/status
/// pass-throughs a real implementation would extend with snapshot calls.
pub struct BackupHandler {
    repo: Repository,
}

impl BackupHandler {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl TaskHandler for BackupHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        self.repo.workspaces.get(task.workspace_id).await?;
        info!(workspace_id = %task.workspace_id, task_id = %task.id, "backup recorded (no-op collaborator)");
        Ok(())
    }
}

pub struct RestoreHandler {
    repo: Repository,
}

impl RestoreHandler {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl TaskHandler for RestoreHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        self.repo.workspaces.get(task.workspace_id).await?;
        info!(workspace_id = %task.workspace_id, task_id = %task.id, "restore recorded (no-op collaborator)");
        Ok(())
    }
}
