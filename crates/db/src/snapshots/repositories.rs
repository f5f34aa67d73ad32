use async_trait::async_trait;
use uuid::Uuid;

use crate::snapshots::models::FollowerSnapshot;
use hubwatch_common::error::HubwatchResult;

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// The stored snapshot for an account, `None` before the first
    /// successful sync.
    async fn get(&self, account_id: Uuid) -> HubwatchResult<Option<FollowerSnapshot>>;

    /// Replace the account's snapshot wholesale (single-row upsert).
    async fn put(&self, account_id: Uuid, snapshot: &FollowerSnapshot) -> HubwatchResult<()>;
}
