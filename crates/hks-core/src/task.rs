use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{TaskId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ProvisionVcluster,
    DeleteVcluster,
    Upgrade,
    Backup,
    Restore,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ProvisionVcluster => "provision_vcluster",
            Self::DeleteVcluster => "delete_vcluster",
            Self::Upgrade => "upgrade",
            Self::Backup => "backup",
            Self::Restore => "restore",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provision_vcluster" => Ok(Self::ProvisionVcluster),
            "delete_vcluster" => Ok(Self::DeleteVcluster),
            "upgrade" => Ok(Self::Upgrade),
            "backup" => Ok(Self::Backup),
            "restore" => Ok(Self::Restore),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Terminal states are immutable: no further updates may be applied
    /// through the engine once a task reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub workspace_id: WorkspaceId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub error: Option<String>,
    pub payload: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by the engine while a worker holds the task; checked by handlers
    /// at safe points so a caller can request cooperative cancellation.
    pub cancelling: bool,
}

impl Task {
    pub fn new(workspace_id: WorkspaceId, task_type: TaskType, payload: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new_v4(),
            workspace_id,
            task_type,
            status: TaskStatus::Pending,
            progress: 0,
            message: None,
            error: None,
            payload,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelling: false,
        }
    }
}
