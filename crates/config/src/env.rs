use hubwatch_common::error::{HubwatchError, HubwatchResult};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    /// Seconds between follower sync rounds.
    pub sync_interval_secs: u64,
    /// Max accounts synced concurrently within one round.
    pub sync_concurrency: usize,
    /// Deadline for one account's full sync (fetch + persist).
    pub sync_account_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> HubwatchResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            sync_interval_secs: parse_var_or("SYNC_INTERVAL_SECS", 600)?,
            sync_concurrency: parse_var_or("SYNC_CONCURRENCY", 4)?,
            sync_account_timeout_secs: parse_var_or("SYNC_ACCOUNT_TIMEOUT_SECS", 120)?,
        })
    }
}

fn get_var(key: &str) -> HubwatchResult<String> {
    env::var(key).map_err(|_| HubwatchError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> HubwatchResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| HubwatchError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
