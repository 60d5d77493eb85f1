use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hks_core::{Error, Result, TaskStatus, TaskType};
use hks_ephemeral::keys as ekeys;
use hks_store::Repository;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::handlers::TaskHandler;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_Q_MAX: i64 = 500;
const LOCK_TTL: Duration = Duration::from_secs(60);
const CLAIM_BATCH: i64 = 1;

/// A pool of `worker_count` loops, each polling every task type's queue,
/// CAS-claiming one task at a time, and running it under the workspace's
/// distributed lock so at most one task per workspace is in flight.
pub struct TaskEngine {
    repo: Repository,
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    worker_count: usize,
    poll_interval: Duration,
    q_max: i64,
    shutdown: Arc<Notify>,
}

impl TaskEngine {
    pub fn new(repo: Repository, handlers: HashMap<TaskType, Arc<dyn TaskHandler>>, worker_count: usize) -> Self {
        Self {
            repo,
            handlers,
            worker_count: worker_count.max(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
            q_max: DEFAULT_Q_MAX,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_q_max(mut self, q_max: i64) -> Self {
        self.q_max = q_max;
        self
    }

    /// Rejects `CreateTask` upstream once queue depth reaches `Q_max`; the
    /// lifecycle engine's enqueue paths should check this before writing a
    /// new task row.
    pub async fn check_backpressure(&self) -> Result<()> {
        if self.repo.tasks.count_pending().await? >= self.q_max {
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    /// Spawns `worker_count` poll loops and returns their join handles. The
    /// caller (construction root) owns the handles and can await them at
    /// shutdown.
    pub fn spawn(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.worker_count)
            .map(|i| {
                let engine = Arc::clone(&self);
                let worker_id = format!("worker-{i}");
                tokio::spawn(async move { engine.run_worker(worker_id).await })
            })
            .collect()
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    async fn run_worker(&self, worker_id: String) {
        let task_types: Vec<TaskType> = self.handlers.keys().copied().collect();
        loop {
            let mut claimed_any = false;
            for task_type in &task_types {
                tokio::select! {
                    _ = self.shutdown.notified() => return,
                    result = self.repo.tasks.claim_pending(*task_type, &worker_id, CLAIM_BATCH) => {
                        match result {
                            Ok(tasks) if !tasks.is_empty() => {
                                claimed_any = true;
                                for task in tasks {
                                    self.run_task(task).await;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(worker_id = %worker_id, task_type = %task_type, error = %e, "failed to poll for pending tasks"),
                        }
                    }
                }
            }
            if !claimed_any {
                tokio::select! {
                    _ = self.shutdown.notified() => return,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
    }

    async fn run_task(&self, task: hks_core::Task) {
        let Some(handler) = self.handlers.get(&task.task_type) else {
            error!(task_id = %task.id, task_type = %task.task_type, "no handler registered for task type");
            let _ = self.repo.tasks.complete(task.id, TaskStatus::Failed, Some("no handler registered")).await;
            return;
        };

        let lock_key = ekeys::workspace_task_lock_key(task.workspace_id);
        let lock_value = uuid::Uuid::new_v4().to_string();
        let acquired = match self.repo.ephemeral.acquire_lock(&lock_key, &lock_value, LOCK_TTL).await {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "failed to acquire workspace task lock");
                let _ = self.repo.tasks.complete(task.id, TaskStatus::Failed, Some(&e.to_string())).await;
                return;
            }
        };
        if !acquired {
            // Another worker is already running a task against this
            // workspace; requeue ours by leaving it running for the stale
            // claim sweeper to pick up, rather than failing it outright.
            warn!(task_id = %task.id, workspace_id = %task.workspace_id, "workspace busy, deferring task");
            return;
        }

        info!(task_id = %task.id, task_type = %task.task_type, workspace_id = %task.workspace_id, "running task");
        let result = handler.handle(&task).await;

        if let Err(e) = self.repo.ephemeral.release_lock(&lock_key, &lock_value).await {
            warn!(task_id = %task.id, error = %e, "failed to release workspace task lock");
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.repo.tasks.complete(task.id, TaskStatus::Completed, None).await {
                    error!(task_id = %task.id, error = %e, "failed to persist task completion");
                }
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "task handler failed");
                if let Err(persist_err) = self.repo.tasks.complete(task.id, TaskStatus::Failed, Some(&e.to_string())).await {
                    error!(task_id = %task.id, error = %persist_err, "failed to persist task failure");
                }
            }
        }
    }

    /// Periodic sweeper releasing tasks claimed by workers that died
    /// mid-lease. Intended to run on a `tokio::time::interval` loop
    /// alongside the session/security-event sweepers.
    pub async fn requeue_stale_claims(&self, lease: Duration) -> Result<u64> {
        let older_than = Utc::now() - chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::minutes(10));
        self.repo.tasks.requeue_stale_claims(older_than).await
    }
}
