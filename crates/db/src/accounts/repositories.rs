use async_trait::async_trait;

use crate::accounts::models::Account;
use hubwatch_common::error::HubwatchResult;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// All registered accounts, oldest first.
    async fn list_accounts(&self) -> HubwatchResult<Vec<Account>>;

    /// Insert a new account or refresh login/token on an existing one,
    /// keyed by the GitHub user id.
    async fn upsert_by_github_id(&self, account: Account) -> HubwatchResult<Account>;
}
