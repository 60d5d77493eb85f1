//! The workspace lifecycle state machine and the durable task engine that
//! drives vCluster provisioning, suspension, deletion, and maintenance
//! operations against it.

pub mod cluster_client;
pub mod handlers;
pub mod helm_client;
pub mod lifecycle;
pub mod task_engine;
pub mod types;

pub use cluster_client::{FakeVClusterClient, VClusterClient, VClusterInfo, VClusterState};
pub use handlers::{BackupHandler, DeleteVclusterHandler, ProvisionVclusterHandler, RestoreHandler, TaskHandler, UpgradeHandler};
pub use helm_client::{FakeHelmClient, HelmClient};
pub use lifecycle::WorkspaceLifecycleEngine;
pub use task_engine::{TaskEngine, DEFAULT_POLL_INTERVAL, DEFAULT_Q_MAX};
pub use types::{CreateWorkspaceRequest, UpdateWorkspaceRequest, WorkspaceOperation};
