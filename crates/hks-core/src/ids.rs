use uuid::Uuid;

pub type UserId = Uuid;
pub type SessionId = Uuid;
pub type WorkspaceId = Uuid;
pub type TaskId = Uuid;
pub type SecurityEventId = Uuid;
pub type OrganizationId = Uuid;
