use std::sync::Arc;

use hks_ephemeral::EphemeralStore;

use crate::members::WorkspaceMemberStore;
use crate::resource_usage::ResourceUsageStore;
use crate::security_events::SecurityEventStore;
use crate::sessions::SessionStore;
use crate::tasks::TaskStore;
use crate::users::UserStore;
use crate::workspaces::WorkspaceStore;

/// Composite repository facade: the single object the service layer holds,
/// routing each call to whichever tier (relational or ephemeral) owns that
/// entity. Nothing here ever opens a transaction that spans both -- a
/// session write commits to Postgres, and only once that returns does a
/// caller touch the Redis-backed blocklists or session sets.
#[derive(Clone)]
pub struct Repository {
    pub users: UserStore,
    pub sessions: SessionStore,
    pub workspaces: WorkspaceStore,
    pub members: WorkspaceMemberStore,
    pub tasks: TaskStore,
    pub security_events: SecurityEventStore,
    pub resource_usage: ResourceUsageStore,
    pub ephemeral: Arc<dyn EphemeralStore>,
}

impl Repository {
    pub fn new(pool: sqlx::PgPool, ephemeral: Arc<dyn EphemeralStore>) -> Self {
        Self {
            users: UserStore::new(pool.clone()),
            sessions: SessionStore::new(pool.clone()),
            workspaces: WorkspaceStore::new(pool.clone()),
            members: WorkspaceMemberStore::new(pool.clone()),
            tasks: TaskStore::new(pool.clone()),
            security_events: SecurityEventStore::new(pool.clone()),
            resource_usage: ResourceUsageStore::new(pool),
            ephemeral,
        }
    }
}
