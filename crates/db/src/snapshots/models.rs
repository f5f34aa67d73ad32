use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal stored profile of one follower.
///
/// The GitHub numeric user id is the identity key; logins can be renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerProfile {
    pub id: i64,
    pub login: String,
    pub display_name: Option<String>,
}

/// The complete follower set of one account as of its last successful sync.
///
/// Replaced wholesale on every successful sync that observed a change; never
/// partially merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerSnapshot {
    pub followers: Vec<FollowerProfile>,
    pub synced_at: DateTime<Utc>,
}
