use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::snapshots::models::{FollowerProfile, FollowerSnapshot};
use crate::snapshots::repositories::SnapshotRepository;
use hubwatch_common::error::{HubwatchError, HubwatchResult};

#[derive(Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> HubwatchResult<FollowerSnapshot> {
        let payload: serde_json::Value = row.get("followers");
        let followers: Vec<FollowerProfile> = serde_json::from_value(payload)
            .map_err(|e| HubwatchError::Internal(format!("corrupt snapshot payload: {e}")))?;

        Ok(FollowerSnapshot {
            followers,
            synced_at: row.get("synced_at"),
        })
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn get(&self, account_id: Uuid) -> HubwatchResult<Option<FollowerSnapshot>> {
        let row = sqlx::query(
            "select followers, synced_at
             from follower_snapshots
             where account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HubwatchError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::map_row(r)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, account_id: Uuid, snapshot: &FollowerSnapshot) -> HubwatchResult<()> {
        let payload = serde_json::to_value(&snapshot.followers)
            .map_err(|e| HubwatchError::Internal(format!("unserializable snapshot: {e}")))?;

        sqlx::query(
            "insert into follower_snapshots (account_id, followers, synced_at)
             values ($1, $2, $3)
             on conflict (account_id) do update
             set followers = excluded.followers, synced_at = excluded.synced_at",
        )
        .bind(account_id)
        .bind(payload)
        .bind(snapshot.synced_at)
        .execute(&self.pool)
        .await
        .map_err(|e| HubwatchError::Database(e.to_string()))?;

        Ok(())
    }
}
