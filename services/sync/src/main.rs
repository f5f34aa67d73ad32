mod collector;
mod github;
mod scheduler;
mod source;
mod worker;

use std::time::Duration;

use hubwatch_config::{init_tracing, AppConfig};
use hubwatch_db::accounts::pg_repository::PgAccountRepository;
use hubwatch_db::snapshots::pg_repository::PgSnapshotRepository;
use tokio::sync::mpsc;

use crate::github::client::{GitHubClient, GitHubClientConfig};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::worker::{SyncOutcome, SyncWorker};

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load config");
    tracing::info!(service = "hubwatch-sync", "starting");

    let pool = hubwatch_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    let accounts = PgAccountRepository::new(pool.clone());
    let snapshots = PgSnapshotRepository::new(pool.clone());

    let github =
        GitHubClient::new(GitHubClientConfig::from_env()).expect("failed to create github client");

    let worker = SyncWorker::new(
        github,
        snapshots,
        Duration::from_secs(config.sync_account_timeout_secs),
    );

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    tokio::spawn(notify_deltas(outcome_rx));

    let scheduler = Scheduler::new(
        SchedulerConfig {
            interval: Duration::from_secs(config.sync_interval_secs),
            concurrency: config.sync_concurrency,
        },
        accounts,
        worker,
    )
    .with_outcomes(outcome_tx);

    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("shutting down");
    scheduler.stop().await;
}

/// Notification seam: surfaces per-account deltas from the outcome feed.
/// A mail or UI collaborator would consume the same channel.
async fn notify_deltas(mut outcome_rx: mpsc::UnboundedReceiver<SyncOutcome>) {
    while let Some(outcome) = outcome_rx.recv().await {
        if outcome.error.is_some() {
            continue;
        }
        for follower in &outcome.added {
            tracing::info!(account = %outcome.login, follower = %follower.login, "new follower");
        }
        for follower in &outcome.removed {
            tracing::info!(account = %outcome.login, follower = %follower.login, "follower lost");
        }
    }
}
