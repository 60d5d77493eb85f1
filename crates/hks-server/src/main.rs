mod config;
mod http;
mod state;
mod sweepers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hks_auth::{AuthService, GitHubProvider, GoogleProvider, KeyService, OAuthProvider};
use hks_core::TaskType;
use hks_ephemeral::RedisEphemeralStore;
use hks_store::Repository;
use hks_workspace::{
    BackupHandler, DeleteVclusterHandler, FakeHelmClient, FakeVClusterClient, HelmClient, ProvisionVclusterHandler,
    RestoreHandler, TaskEngine, TaskHandler, UpgradeHandler, VClusterClient, WorkspaceLifecycleEngine,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use crate::config::Cli;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hks=info,tower_http=info")))
        .init();

    let cli = Cli::parse();

    tracing::info!("connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to postgres")?;
    sqlx::migrate!("../hks-store/migrations").run(&pool).await.context("migration failed")?;

    tracing::info!("connecting to redis");
    let ephemeral = Arc::new(
        RedisEphemeralStore::connect(&cli.redis_url)
            .await
            .context("failed to connect to redis")?,
    );

    let repo = Repository::new(pool, ephemeral);

    let keys = Arc::new(KeyService::new().context("failed to generate signing key pair")?);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build shared HTTP client")?;

    let mut providers: HashMap<String, Arc<dyn OAuthProvider>> = HashMap::new();
    if let (Some(id), Some(secret)) = (cli.google_client_id.clone(), cli.google_client_secret.clone()) {
        providers.insert("google".to_string(), Arc::new(GoogleProvider::new(http_client.clone(), id, secret)));
    }
    if let (Some(id), Some(secret)) = (cli.github_client_id.clone(), cli.github_client_secret.clone()) {
        providers.insert("github".to_string(), Arc::new(GitHubProvider::new(http_client.clone(), id, secret)));
    }
    if providers.is_empty() {
        tracing::warn!("no OAuth provider credentials configured; login will fail until GOOGLE_* or GITHUB_* env vars are set");
    }

    let auth = Arc::new(AuthService::new(repo.clone(), keys.clone(), providers, cli.max_sessions_per_user));

    // No real vCluster/Helm backend ships in this workspace; the construction
    // root wires the in-memory fakes so the control plane is runnable
    // end-to-end in development. A production deployment swaps these two
    // lines for real implementations of `VClusterClient`/`HelmClient`.
    let cluster: Arc<dyn VClusterClient> = Arc::new(FakeVClusterClient::new());
    let helm: Arc<dyn HelmClient> = Arc::new(FakeHelmClient::new());

    let lifecycle = Arc::new(WorkspaceLifecycleEngine::new(repo.clone(), cluster.clone(), helm.clone()));

    let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();
    handlers.insert(TaskType::ProvisionVcluster, Arc::new(ProvisionVclusterHandler::new(repo.clone(), cluster.clone(), helm.clone())));
    handlers.insert(TaskType::DeleteVcluster, Arc::new(DeleteVclusterHandler::new(repo.clone(), cluster.clone())));
    handlers.insert(TaskType::Upgrade, Arc::new(UpgradeHandler::new(repo.clone(), cluster.clone())));
    handlers.insert(TaskType::Backup, Arc::new(BackupHandler::new(repo.clone())));
    handlers.insert(TaskType::Restore, Arc::new(RestoreHandler::new(repo.clone())));

    let task_engine = Arc::new(
        TaskEngine::new(repo.clone(), handlers, cli.task_workers).with_q_max(cli.task_queue_max),
    );
    let worker_handles = Arc::clone(&task_engine).spawn();

    tokio::spawn(sweepers::run_relational_sweeper(
        repo.clone(),
        Duration::from_secs(cli.sweep_interval_secs),
        chrono::Duration::days(cli.security_event_retention_days),
    ));
    tokio::spawn(sweepers::run_stale_claim_sweeper(
        Arc::clone(&task_engine),
        Duration::from_secs(cli.stale_claim_sweep_secs),
        Duration::from_secs(cli.task_claim_lease_secs),
    ));

    let state = AppState { auth, keys, lifecycle };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen_addr).await.context("failed to bind listen address")?;
    tracing::info!(addr = %cli.listen_addr, "listening");
    axum::serve(listener, app).await.context("server error")?;

    task_engine.shutdown();
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}
