pub mod accounts;
pub mod snapshots;

use hubwatch_common::error::{HubwatchError, HubwatchResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> HubwatchResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| HubwatchError::Database(e.to_string()))
}
