//! PostgreSQL-backed repositories for every relational entity (users,
//! sessions, workspaces, members, tasks, security events, resource usage
//! samples), plus [`composite::Repository`], the facade the service layer
//! actually holds.

pub mod composite;
pub mod members;
pub mod resource_usage;
pub mod security_events;
pub mod sessions;
pub mod tasks;
pub mod users;
pub mod workspaces;

pub use composite::Repository;
pub use members::WorkspaceMemberStore;
pub use resource_usage::ResourceUsageStore;
pub use security_events::SecurityEventStore;
pub use sessions::SessionStore;
pub use tasks::TaskStore;
pub use users::UserStore;
pub use workspaces::{WorkspaceFilter, WorkspaceStore};
