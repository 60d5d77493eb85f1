use clap::Parser;

#[derive(Parser, Clone)]
#[command(name = "hks-server", about = "Workspace lifecycle and identity coordination server")]
pub struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection string backing the ephemeral tier
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: String,

    /// Address the HTTP server listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Google OAuth client id
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: Option<String>,

    /// GitHub OAuth client id
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    pub github_client_id: Option<String>,

    /// GitHub OAuth client secret
    #[arg(long, env = "GITHUB_CLIENT_SECRET")]
    pub github_client_secret: Option<String>,

    /// Maximum concurrent sessions retained per user before the oldest is evicted
    #[arg(long, env = "MAX_SESSIONS_PER_USER", default_value_t = 10)]
    pub max_sessions_per_user: usize,

    /// Number of task-engine worker loops
    #[arg(long, env = "TASK_WORKERS", default_value_t = 4)]
    pub task_workers: usize,

    /// Task queue depth at which CreateTask starts rejecting with QueueFull
    #[arg(long, env = "TASK_QUEUE_MAX", default_value_t = hks_workspace::DEFAULT_Q_MAX)]
    pub task_queue_max: i64,

    /// Interval between expired-session and old-security-event sweeps, in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Interval between stale-task-claim sweeps, in seconds
    #[arg(long, env = "STALE_CLAIM_SWEEP_SECS", default_value_t = 120)]
    pub stale_claim_sweep_secs: u64,

    /// How long a security event is retained before the sweeper deletes it, in days
    #[arg(long, env = "SECURITY_EVENT_RETENTION_DAYS", default_value_t = 90)]
    pub security_event_retention_days: i64,

    /// How long a claimed task may run before its claim is considered stale, in seconds
    #[arg(long, env = "TASK_CLAIM_LEASE_SECS", default_value_t = 1800)]
    pub task_claim_lease_secs: u64,
}
