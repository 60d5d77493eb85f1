use std::time::Duration;

use chrono::Utc;
use hks_store::Repository;
use hks_workspace::TaskEngine;
use tracing::{info, warn};

/// Periodically deletes expired sessions and aged-out security events.
/// Runs until the process exits; errors are logged and the loop continues
/// rather than aborting the sweeper for one bad tick.
pub async fn run_relational_sweeper(repo: Repository, interval: Duration, security_event_retention: chrono::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Utc::now();

        match repo.sessions.cleanup_expired(now).await {
            Ok(n) if n > 0 => info!(removed = n, "expired sessions swept"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "expired-session sweep failed"),
        }

        match repo.security_events.cleanup_older_than(now - security_event_retention).await {
            Ok(n) if n > 0 => info!(removed = n, "old security events swept"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "security-event sweep failed"),
        }
    }
}

/// Periodically requeues tasks whose claim outlived the worker that took
/// them (crashed worker, lost lock, etc.).
pub async fn run_stale_claim_sweeper(engine: std::sync::Arc<TaskEngine>, interval: Duration, lease: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match engine.requeue_stale_claims(lease).await {
            Ok(n) if n > 0 => info!(requeued = n, "stale task claims requeued"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "stale-claim sweep failed"),
        }
    }
}
