//! Exercises task-engine invariants (terminal-state immutability, queue
//! backpressure) against a real PostgreSQL instance.
//!
//! ```
//! DATABASE_URL=postgres://localhost/hks_test cargo test -p hks-workspace --test task_engine_test -- --ignored
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use hks_core::{Error, Task, TaskStatus, TaskType, Workspace, WorkspacePlan};
use hks_ephemeral::MemoryEphemeralStore;
use hks_store::Repository;
use hks_workspace::TaskEngine;
use sqlx::PgPool;

async fn test_pool() -> PgPool {
    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/hks_test".into());
    let pool = PgPool::connect(&db_url).await.unwrap();
    sqlx::migrate!("../hks-store/migrations").run(&pool).await.unwrap();
    pool
}

fn repo(pool: PgPool) -> Repository {
    Repository::new(pool, Arc::new(MemoryEphemeralStore::new()))
}

async fn seed_workspace(repo: &Repository) -> Workspace {
    let workspace = Workspace::new(uuid::Uuid::new_v4(), format!("w-{}", uuid::Uuid::new_v4()), None, WorkspacePlan::Shared);
    repo.workspaces.create(&workspace).await.unwrap();
    workspace
}

#[tokio::test]
#[ignore]
async fn test_completed_task_is_immutable() {
    let pool = test_pool().await;
    let repo = repo(pool.clone());
    let workspace = seed_workspace(&repo).await;

    let task = Task::new(workspace.id, TaskType::Backup, HashMap::new());
    repo.tasks.create(&task).await.unwrap();

    repo.tasks.complete(task.id, TaskStatus::Completed, None).await.unwrap();

    let second = repo.tasks.complete(task.id, TaskStatus::Failed, Some("too late")).await;
    assert!(matches!(second, Err(Error::Conflict(_))), "completed task must reject further transitions");

    let reloaded = repo.tasks.get(task.id).await.unwrap();
    assert_eq!(reloaded.status, TaskStatus::Completed);

    repo.workspaces.delete(workspace.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_queue_backpressure_rejects_past_q_max() {
    let pool = test_pool().await;
    let repo = repo(pool.clone());
    let workspace = seed_workspace(&repo).await;
    let engine = TaskEngine::new(repo.clone(), HashMap::new(), 1).with_q_max(2);

    let t1 = Task::new(workspace.id, TaskType::Backup, HashMap::new());
    let t2 = Task::new(workspace.id, TaskType::Backup, HashMap::new());
    repo.tasks.create(&t1).await.unwrap();
    repo.tasks.create(&t2).await.unwrap();

    let result = engine.check_backpressure().await;
    assert!(matches!(result, Err(Error::QueueFull)), "queue at Q_max must report QueueFull");

    repo.tasks.complete(t1.id, TaskStatus::Completed, None).await.unwrap();
    repo.tasks.complete(t2.id, TaskStatus::Completed, None).await.unwrap();
    engine.check_backpressure().await.unwrap();

    repo.workspaces.delete(workspace.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_claim_pending_is_scoped_to_task_type() {
    let pool = test_pool().await;
    let repo = repo(pool.clone());
    let workspace = seed_workspace(&repo).await;

    let backup = Task::new(workspace.id, TaskType::Backup, HashMap::new());
    let restore = Task::new(workspace.id, TaskType::Restore, HashMap::new());
    repo.tasks.create(&backup).await.unwrap();
    repo.tasks.create(&restore).await.unwrap();

    let claimed = repo.tasks.claim_pending(TaskType::Backup, "worker-1", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, backup.id);

    let still_pending = repo.tasks.get(restore.id).await.unwrap();
    assert_eq!(still_pending.status, TaskStatus::Pending, "restore task must not be claimed by a backup-type poll");

    repo.tasks.complete(backup.id, TaskStatus::Completed, None).await.unwrap();
    repo.tasks.complete(restore.id, TaskStatus::Completed, None).await.unwrap();

    repo.workspaces.delete(workspace.id).await.unwrap();
}
