use async_trait::async_trait;

use crate::github::client::GitHubClientError;
use crate::github::models::GitHubUser;

/// One page of a follower listing plus the continuation signal.
///
/// `next_page == None` is the terminal marker; the caller must stop.
#[derive(Debug, Clone)]
pub struct FollowerPage {
    pub followers: Vec<GitHubUser>,
    pub next_page: Option<u32>,
}

/// A source of follower-list pages.
///
/// `GitHubClient` is the production implementation; tests supply stubs.
#[async_trait]
pub trait FollowerPageSource: Send + Sync {
    /// Fetch one page on behalf of `token`. `page == None` requests the
    /// first page.
    async fn fetch_page(
        &self,
        token: &str,
        page: Option<u32>,
    ) -> Result<FollowerPage, GitHubClientError>;
}
