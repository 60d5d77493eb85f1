//! Exercises the workspace state machine and the provisioning/deletion
//! task bodies against a real PostgreSQL instance, with the vCluster and
//! Helm collaborators faked out.
//!
//! ```
//! DATABASE_URL=postgres://localhost/hks_test cargo test -p hks-workspace --test workspace_lifecycle_test -- --ignored
//! ```

use std::sync::Arc;

use hks_core::{Error, OrganizationId, TaskStatus, WorkspacePlan, WorkspaceStatus};
use hks_ephemeral::MemoryEphemeralStore;
use hks_store::Repository;
use hks_workspace::handlers::{DeleteVclusterHandler, ProvisionVclusterHandler, TaskHandler};
use hks_workspace::{CreateWorkspaceRequest, FakeHelmClient, FakeVClusterClient, WorkspaceLifecycleEngine};
use sqlx::PgPool;

async fn test_pool() -> PgPool {
    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/hks_test".into());
    let pool = PgPool::connect(&db_url).await.unwrap();
    sqlx::migrate!("../hks-store/migrations").run(&pool).await.unwrap();
    pool
}

fn engine(pool: PgPool, cluster: Arc<FakeVClusterClient>, helm: Arc<FakeHelmClient>) -> WorkspaceLifecycleEngine {
    let ephemeral = Arc::new(MemoryEphemeralStore::new());
    let repo = Repository::new(pool, ephemeral);
    WorkspaceLifecycleEngine::new(repo, cluster, helm)
}

#[tokio::test]
#[ignore]
async fn test_provisioning_happy_path_shared_plan() {
    let pool = test_pool().await;
    let cluster = Arc::new(FakeVClusterClient::new());
    let helm = Arc::new(FakeHelmClient::new());
    let lifecycle = engine(pool.clone(), cluster.clone(), helm.clone());

    let org = OrganizationId::new_v4();
    let (workspace, task) = lifecycle
        .create_workspace(CreateWorkspaceRequest {
            organization_id: org,
            name: format!("w-{}", uuid::Uuid::new_v4()),
            description: None,
            plan: WorkspacePlan::Shared,
            plan_id: None,
        })
        .await
        .unwrap();
    assert_eq!(workspace.status, WorkspaceStatus::Creating);
    assert_eq!(task.status, TaskStatus::Pending);

    let ephemeral = Arc::new(MemoryEphemeralStore::new());
    let repo = Repository::new(pool.clone(), ephemeral);
    let handler = ProvisionVclusterHandler::new(repo.clone(), cluster.clone(), helm.clone());
    let stored_task = repo.tasks.get(task.id).await.unwrap();
    handler.handle(&stored_task).await.unwrap();

    let reloaded = repo.workspaces.get(workspace.id).await.unwrap();
    assert_eq!(reloaded.status, WorkspaceStatus::Active);
    assert_eq!(helm.installs.lock().unwrap().len(), 1);

    repo.workspaces.delete(workspace.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_provisioning_with_helm_failure_is_non_fatal() {
    let pool = test_pool().await;
    let cluster = Arc::new(FakeVClusterClient::new());
    let helm = Arc::new(FakeHelmClient::new());
    let lifecycle = engine(pool.clone(), cluster.clone(), helm.clone());

    let org = OrganizationId::new_v4();
    let (workspace, task) = lifecycle
        .create_workspace(CreateWorkspaceRequest {
            organization_id: org,
            name: format!("w-{}", uuid::Uuid::new_v4()),
            description: None,
            plan: WorkspacePlan::Shared,
            plan_id: None,
        })
        .await
        .unwrap();

    *helm.fail_release.lock().unwrap() = Some("hks-observability-agents".to_string());

    let ephemeral = Arc::new(MemoryEphemeralStore::new());
    let repo = Repository::new(pool.clone(), ephemeral);
    let handler = ProvisionVclusterHandler::new(repo.clone(), cluster.clone(), helm.clone());
    let stored_task = repo.tasks.get(task.id).await.unwrap();
    handler.handle(&stored_task).await.unwrap();

    let reloaded = repo.workspaces.get(workspace.id).await.unwrap();
    assert_eq!(reloaded.status, WorkspaceStatus::Active, "helm failure must not fail provisioning");

    repo.workspaces.delete(workspace.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_delete_in_flight_workspace_conflicts() {
    let pool = test_pool().await;
    let cluster = Arc::new(FakeVClusterClient::new());
    let helm = Arc::new(FakeHelmClient::new());
    let lifecycle = engine(pool.clone(), cluster.clone(), helm.clone());

    let org = OrganizationId::new_v4();
    let (workspace, _task) = lifecycle
        .create_workspace(CreateWorkspaceRequest {
            organization_id: org,
            name: format!("w-{}", uuid::Uuid::new_v4()),
            description: None,
            plan: WorkspacePlan::Dedicated,
            plan_id: None,
        })
        .await
        .unwrap();

    lifecycle.delete_workspace(workspace.id).await.unwrap();
    let second = lifecycle.delete_workspace(workspace.id).await;
    assert!(matches!(second, Err(Error::Conflict(_))), "deleting an already-deleting workspace must conflict");

    let ephemeral = Arc::new(MemoryEphemeralStore::new());
    let repo = Repository::new(pool.clone(), ephemeral);
    repo.workspaces.delete(workspace.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_illegal_transition_rejected() {
    let pool = test_pool().await;
    let cluster = Arc::new(FakeVClusterClient::new());
    let helm = Arc::new(FakeHelmClient::new());
    let lifecycle = engine(pool.clone(), cluster.clone(), helm.clone());

    let org = OrganizationId::new_v4();
    let (workspace, _task) = lifecycle
        .create_workspace(CreateWorkspaceRequest {
            organization_id: org,
            name: format!("w-{}", uuid::Uuid::new_v4()),
            description: None,
            plan: WorkspacePlan::Shared,
            plan_id: None,
        })
        .await
        .unwrap();

    // Workspace is still `creating`; reactivating requires `suspended`.
    let result = lifecycle.reactivate(workspace.id).await;
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));

    let ephemeral = Arc::new(MemoryEphemeralStore::new());
    let repo = Repository::new(pool.clone(), ephemeral);
    repo.workspaces.delete(workspace.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_deletion_task_removes_workspace_row() {
    let pool = test_pool().await;
    let cluster = Arc::new(FakeVClusterClient::new());
    let helm = Arc::new(FakeHelmClient::new());
    let lifecycle = engine(pool.clone(), cluster.clone(), helm.clone());

    let org = OrganizationId::new_v4();
    let (workspace, _task) = lifecycle
        .create_workspace(CreateWorkspaceRequest {
            organization_id: org,
            name: format!("w-{}", uuid::Uuid::new_v4()),
            description: None,
            plan: WorkspacePlan::Dedicated,
            plan_id: None,
        })
        .await
        .unwrap();

    let delete_task = lifecycle.delete_workspace(workspace.id).await.unwrap();

    let ephemeral = Arc::new(MemoryEphemeralStore::new());
    let repo = Repository::new(pool.clone(), ephemeral);
    let handler = DeleteVclusterHandler::new(repo.clone(), cluster.clone());
    let stored_task = repo.tasks.get(delete_task.id).await.unwrap();
    handler.handle(&stored_task).await.unwrap();

    let result = repo.workspaces.get(workspace.id).await;
    assert!(matches!(result, Err(Error::NotFound(_))), "deleted workspace row must be gone");
}
