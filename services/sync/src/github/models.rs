use serde::{Deserialize, Serialize};

/// A user record from the GitHub REST API follower listing
/// (`GET /user/followers`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
