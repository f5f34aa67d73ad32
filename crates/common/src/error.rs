use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubwatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type HubwatchResult<T> = Result<T, HubwatchError>;
