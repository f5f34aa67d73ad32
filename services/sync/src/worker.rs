use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use hubwatch_common::error::HubwatchError;
use hubwatch_db::accounts::models::Account;
use hubwatch_db::snapshots::models::{FollowerProfile, FollowerSnapshot};
use hubwatch_db::snapshots::repositories::SnapshotRepository;

use crate::collector::collect_followers;
use crate::github::client::GitHubClientError;
use crate::github::models::GitHubUser;
use crate::source::FollowerPageSource;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("follower fetch failed: {0}")]
    Fetch(#[from] GitHubClientError),

    #[error("snapshot store failed: {0}")]
    Store(#[from] HubwatchError),

    #[error("sync exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("sync task canceled")]
    Canceled,
}

/// Per-account result of one sync round, consumed by the scheduler's round
/// log and the notification feed.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub account_id: Uuid,
    pub login: String,
    pub added: Vec<FollowerProfile>,
    pub removed: Vec<FollowerProfile>,
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn failed(account: &Account, error: &SyncError) -> Self {
        Self {
            account_id: account.id,
            login: account.login.clone(),
            added: Vec::new(),
            removed: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Syncs one account's follower set against its stored snapshot.
pub struct SyncWorker<F, S> {
    source: F,
    snapshots: S,
    account_timeout: Duration,
}

impl<F, S> SyncWorker<F, S>
where
    F: FollowerPageSource,
    S: SnapshotRepository,
{
    pub fn new(source: F, snapshots: S, account_timeout: Duration) -> Self {
        Self {
            source,
            snapshots,
            account_timeout,
        }
    }

    /// Sync one account end to end under the per-account deadline.
    ///
    /// Never returns an error; failures are captured in the outcome and the
    /// stored snapshot is left untouched.
    pub async fn sync(&self, account: &Account) -> SyncOutcome {
        match tokio::time::timeout(self.account_timeout, self.sync_account(account)).await {
            Ok(Ok((added, removed))) => SyncOutcome {
                account_id: account.id,
                login: account.login.clone(),
                added,
                removed,
                error: None,
            },
            Ok(Err(error)) => SyncOutcome::failed(account, &error),
            Err(_) => SyncOutcome::failed(account, &SyncError::Timeout(self.account_timeout)),
        }
    }

    async fn sync_account(
        &self,
        account: &Account,
    ) -> Result<(Vec<FollowerProfile>, Vec<FollowerProfile>), SyncError> {
        let previous = self.snapshots.get(account.id).await?;
        let fetched = collect_followers(&self.source, &account.access_token).await?;

        let current: Vec<FollowerProfile> = fetched.iter().map(to_profile).collect();
        let old = previous.map(|s| s.followers).unwrap_or_default();
        let (added, removed) = diff_followers(&old, &current);

        if added.is_empty() && removed.is_empty() {
            tracing::debug!(account = %account.login, "follower set unchanged, skipping write");
            return Ok((added, removed));
        }

        let snapshot = FollowerSnapshot {
            followers: current,
            synced_at: Utc::now(),
        };
        self.snapshots.put(account.id, &snapshot).await?;

        Ok((added, removed))
    }
}

fn to_profile(user: &GitHubUser) -> FollowerProfile {
    FollowerProfile {
        id: user.id,
        login: user.login.clone(),
        display_name: user.name.clone(),
    }
}

/// Set difference by follower id in both directions.
fn diff_followers(
    old: &[FollowerProfile],
    new: &[FollowerProfile],
) -> (Vec<FollowerProfile>, Vec<FollowerProfile>) {
    let old_ids: HashSet<i64> = old.iter().map(|f| f.id).collect();
    let new_ids: HashSet<i64> = new.iter().map(|f| f.id).collect();

    let added = new
        .iter()
        .filter(|f| !old_ids.contains(&f.id))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|f| !new_ids.contains(&f.id))
        .cloned()
        .collect();
    (added, removed)
}
