use async_trait::async_trait;
use hks_core::{Node, Result, ResourceUsage, WorkspaceId, WorkspacePlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VClusterState {
    Running,
    Pending,
    Error,
}

#[derive(Debug, Clone)]
pub struct VClusterInfo {
    pub endpoint: Option<String>,
    pub api_server: Option<String>,
    pub kubeconfig: Option<String>,
    pub status: VClusterState,
}

/// Everything the lifecycle engine and task handlers need from the
/// underlying vCluster control plane. One real implementation talks to the
/// actual Kubernetes/vCluster APIs; tests and local development use
/// [`FakeVClusterClient`].
#[async_trait]
pub trait VClusterClient: Send + Sync + 'static {
    async fn create_vcluster(&self, workspace_id: WorkspaceId, plan: WorkspacePlan) -> Result<()>;
    async fn delete_vcluster(&self, workspace_id: WorkspaceId) -> Result<()>;
    /// Polls until ready or the caller's deadline elapses.
    async fn wait_for_vcluster_ready(&self, workspace_id: WorkspaceId) -> Result<()>;
    async fn wait_for_vcluster_deleted(&self, workspace_id: WorkspaceId) -> Result<()>;
    async fn get_vcluster_status(&self, workspace_id: WorkspaceId) -> Result<VClusterState>;
    async fn get_vcluster_info(&self, workspace_id: WorkspaceId) -> Result<VClusterInfo>;
    async fn scale_vcluster(&self, workspace_id: WorkspaceId, replicas: u32) -> Result<()>;
    async fn configure_oidc(&self, workspace_id: WorkspaceId) -> Result<()>;
    async fn update_oidc_config(&self, workspace_id: WorkspaceId, user_groups: Vec<(String, Vec<String>)>) -> Result<()>;
    async fn apply_resource_quotas(&self, workspace_id: WorkspaceId, plan: WorkspacePlan) -> Result<()>;
    async fn get_resource_metrics(&self, workspace_id: WorkspaceId) -> Result<ResourceUsage>;
    async fn list_vcluster_nodes(&self, workspace_id: WorkspaceId) -> Result<Vec<Node>>;
    async fn scale_vcluster_deployment(&self, workspace_id: WorkspaceId, deployment: &str, replicas: u32) -> Result<()>;
}

/// In-memory test double, always compiled (mirrors [`hks_ephemeral::MemoryEphemeralStore`]'s
/// always-available stance) so the construction root can run without a real
/// cluster during local development too.
pub mod fake {
    use std::sync::Mutex;

    use chrono::Utc;
    use dashmap::DashMap;

    use super::*;

    #[derive(Default)]
    struct WorkspaceState {
        exists: bool,
        replicas: u32,
    }

    /// In-memory double used by the lifecycle and task-engine tests, and by
    /// anyone running the server without a real Kubernetes cluster handy.
    pub struct FakeVClusterClient {
        state: DashMap<WorkspaceId, WorkspaceState>,
        pub fail_create: Mutex<Option<WorkspaceId>>,
    }

    impl Default for FakeVClusterClient {
        fn default() -> Self {
            Self {
                state: DashMap::new(),
                fail_create: Mutex::new(None),
            }
        }
    }

    impl FakeVClusterClient {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl VClusterClient for FakeVClusterClient {
        async fn create_vcluster(&self, workspace_id: WorkspaceId, _plan: WorkspacePlan) -> Result<()> {
            if *self.fail_create.lock().unwrap() == Some(workspace_id) {
                return Err(hks_core::Error::provider("simulated CreateVCluster failure", true));
            }
            self.state.insert(workspace_id, WorkspaceState { exists: true, replicas: 1 });
            Ok(())
        }

        async fn delete_vcluster(&self, workspace_id: WorkspaceId) -> Result<()> {
            self.state.remove(&workspace_id);
            Ok(())
        }

        async fn wait_for_vcluster_ready(&self, _workspace_id: WorkspaceId) -> Result<()> {
            Ok(())
        }

        async fn wait_for_vcluster_deleted(&self, _workspace_id: WorkspaceId) -> Result<()> {
            Ok(())
        }

        async fn get_vcluster_status(&self, workspace_id: WorkspaceId) -> Result<VClusterState> {
            Ok(if self.state.get(&workspace_id).map(|s| s.exists).unwrap_or(false) {
                VClusterState::Running
            } else {
                VClusterState::Pending
            })
        }

        async fn get_vcluster_info(&self, workspace_id: WorkspaceId) -> Result<VClusterInfo> {
            let status = self.get_vcluster_status(workspace_id).await?;
            Ok(VClusterInfo {
                endpoint: Some(format!("https://{workspace_id}.vcluster.internal")),
                api_server: Some(format!("https://{workspace_id}.vcluster.internal:6443")),
                kubeconfig: Some(format!("fake-kubeconfig-{workspace_id}")),
                status,
            })
        }

        async fn scale_vcluster(&self, workspace_id: WorkspaceId, replicas: u32) -> Result<()> {
            if let Some(mut entry) = self.state.get_mut(&workspace_id) {
                entry.replicas = replicas;
            }
            Ok(())
        }

        async fn configure_oidc(&self, _workspace_id: WorkspaceId) -> Result<()> {
            Ok(())
        }

        async fn update_oidc_config(&self, _workspace_id: WorkspaceId, _user_groups: Vec<(String, Vec<String>)>) -> Result<()> {
            Ok(())
        }

        async fn apply_resource_quotas(&self, _workspace_id: WorkspaceId, _plan: WorkspacePlan) -> Result<()> {
            Ok(())
        }

        async fn get_resource_metrics(&self, workspace_id: WorkspaceId) -> Result<ResourceUsage> {
            Ok(ResourceUsage {
                workspace_id,
                cpu_millicores: 250,
                memory_bytes: 512 * 1024 * 1024,
                storage_bytes: 1024 * 1024 * 1024,
                pod_count: 4,
                sampled_at: Utc::now(),
            })
        }

        async fn list_vcluster_nodes(&self, _workspace_id: WorkspaceId) -> Result<Vec<Node>> {
            Ok(vec![Node {
                name: "fake-node-0".to_string(),
                ready: true,
                cpu_capacity_millicores: 4000,
                memory_capacity_bytes: 8 * 1024 * 1024 * 1024,
            }])
        }

        async fn scale_vcluster_deployment(&self, _workspace_id: WorkspaceId, _deployment: &str, _replicas: u32) -> Result<()> {
            Ok(())
        }
    }
}

pub use fake::FakeVClusterClient;
