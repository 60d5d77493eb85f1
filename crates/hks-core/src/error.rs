use thiserror::Error;

/// The error taxonomy shared by every layer of the control plane.
///
/// Repositories translate driver errors (`sqlx`, `redis`, `jsonwebtoken`) into
/// these variants; services add context; the (external) HTTP layer maps them
/// to status codes. Task workers never let an `Error` escape the process —
/// they persist it on the task row instead (see `hks_workspace::task_engine`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("blocklisted")]
    Blocklisted,

    #[error("PKCE verification failed")]
    PkceFailure,

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("task queue full")]
    QueueFull,

    #[error("lock not held: {0}")]
    LockNotHeld(String),

    #[error("provider error: {message} (retryable={retryable})")]
    ProviderError { message: String, retryable: bool },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the collaborator failure behind a `ProviderError` is worth
    /// retrying (transient network blip) versus terminal (bad request,
    /// quota exhausted).
    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        Error::ProviderError {
            message: message.into(),
            retryable,
        }
    }

    pub fn not_found(entity: impl std::fmt::Display) -> Self {
        Error::NotFound(entity.to_string())
    }
}
