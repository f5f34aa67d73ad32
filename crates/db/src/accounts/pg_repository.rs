use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::accounts::models::Account;
use crate::accounts::repositories::AccountRepository;
use hubwatch_common::error::{HubwatchError, HubwatchResult};

#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> HubwatchResult<Account> {
        Ok(Account {
            id: row.get("id"),
            github_id: row.get("github_id"),
            login: row.get("login"),
            access_token: row.get("access_token"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn list_accounts(&self) -> HubwatchResult<Vec<Account>> {
        let rows = sqlx::query(
            "select id, github_id, login, access_token, created_at, updated_at
             from accounts
             order by created_at asc",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HubwatchError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn upsert_by_github_id(&self, account: Account) -> HubwatchResult<Account> {
        let now = Utc::now();
        let row = sqlx::query(
            "insert into accounts (id, github_id, login, access_token, created_at, updated_at)
             values ($1, $2, $3, $4, $5, $5)
             on conflict (github_id) do update
             set login = excluded.login, access_token = excluded.access_token, updated_at = $5
             returning id, github_id, login, access_token, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(account.github_id)
        .bind(&account.login)
        .bind(&account.access_token)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| HubwatchError::Database(e.to_string()))?;

        Self::map_row(row)
    }
}
