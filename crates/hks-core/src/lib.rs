//! Shared domain types, id aliases, and the error taxonomy used across the
//! workspace lifecycle and identity coordination core.
//!
//! This crate has no I/O of its own -- it is the vocabulary every other
//! crate (`hks-store`, `hks-ephemeral`, `hks-auth`, `hks-workspace`) builds
//! on.

pub mod auth;
pub mod error;
pub mod ids;
pub mod task;
pub mod user;
pub mod workspace;

pub use auth::{AccessClaims, AuthState, SecurityEvent, SecurityLevel, Session};
pub use error::{Error, Result};
pub use ids::*;
pub use task::{Task, TaskStatus, TaskType};
pub use user::User;
pub use workspace::{ClusterInfo, MemberRole, Node, ResourceUsage, Workspace, WorkspaceMember, WorkspacePlan, WorkspaceStatus};
