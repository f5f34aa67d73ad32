use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, StatusCode};

use super::models::GitHubUser;
use crate::source::{FollowerPage, FollowerPageSource};

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub api_base: String,
    pub timeout_secs: u64,
    pub page_size: u32,
}

impl GitHubClientConfig {
    pub fn from_env() -> Self {
        let api_base = std::env::var("GITHUB_API_BASE")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let timeout_secs = std::env::var("GITHUB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let page_size = std::env::var("GITHUB_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            api_base,
            timeout_secs,
            page_size,
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GitHubClientError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("credential rejected: HTTP {status}")]
    AuthRejected { status: StatusCode },

    #[error("rate limited: HTTP {status}")]
    RateLimited { status: StatusCode },

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("pagination did not terminate after {pages} pages")]
    PaginationOverflow { pages: u32 },
}

impl From<reqwest::Error> for GitHubClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("hubwatch")
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.config.api_base = api_base.to_string();
        self
    }
}

#[async_trait]
impl FollowerPageSource for GitHubClient {
    /// One network round trip per call; no retries at this layer — error
    /// recovery is the next scheduled round's job.
    async fn fetch_page(
        &self,
        token: &str,
        page: Option<u32>,
    ) -> Result<FollowerPage, GitHubClientError> {
        let page = page.unwrap_or(1);
        let url = format!(
            "{}/user/followers?per_page={}&page={}",
            self.config.api_base, self.config.page_size, page
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                return Err(GitHubClientError::AuthRejected { status });
            }
            if status == StatusCode::TOO_MANY_REQUESTS
                || (status == StatusCode::FORBIDDEN && rate_limit_exhausted(response.headers()))
            {
                return Err(GitHubClientError::RateLimited { status });
            }
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubClientError::Http { status, body });
        }

        let next_page = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        let followers = response.json::<Vec<GitHubUser>>().await?;

        Ok(FollowerPage {
            followers,
            next_page,
        })
    }
}

/// GitHub signals primary-quota exhaustion as 403 with a zeroed
/// `x-ratelimit-remaining` header.
fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

/// Extract the page number from a `Link` header's `rel="next"` entry.
/// Absent entry means the listing is exhausted.
fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.contains("rel=\"next\"") {
            return None;
        }
        let url = target.trim().trim_start_matches('<').trim_end_matches('>');
        let query = url.split_once('?')?.1;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "page").then(|| value.parse().ok()).flatten()
        })
    })
}
