use std::collections::HashSet;

use crate::github::client::GitHubClientError;
use crate::github::models::GitHubUser;
use crate::source::FollowerPageSource;

/// Ceiling on pages per collection; a cursor that never terminates
/// (e.g. a cyclic `Link` header) fails instead of looping forever.
const MAX_FOLLOWER_PAGES: u32 = 10_000;

/// Accumulate the complete follower set for one credential by walking the
/// page cursor to exhaustion.
///
/// The first fetch error aborts the walk and the partial set is discarded.
/// Entries repeated across page boundaries (the listing can shift under a
/// concurrent follow/unfollow) are deduplicated by user id, keeping the
/// first occurrence.
pub async fn collect_followers<S>(
    source: &S,
    token: &str,
) -> Result<Vec<GitHubUser>, GitHubClientError>
where
    S: FollowerPageSource + ?Sized,
{
    let mut followers = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<u32> = None;
    let mut pages: u32 = 0;

    loop {
        let page = source.fetch_page(token, cursor).await?;
        pages += 1;

        for user in page.followers {
            if seen.insert(user.id) {
                followers.push(user);
            }
        }

        match page.next_page {
            None => break,
            Some(_) if pages >= MAX_FOLLOWER_PAGES => {
                return Err(GitHubClientError::PaginationOverflow { pages });
            }
            Some(next) => cursor = Some(next),
        }
    }

    Ok(followers)
}
