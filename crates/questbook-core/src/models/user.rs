use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated user's profile as returned by `GET /auth/profile`.
///
/// The server owns this record; the client holds a read-mostly cached copy.
/// Fields beyond the identifying quartet are optional so older clients keep
/// parsing as the backend grows the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "avatarUrl", default)]
    pub avatar_url: Option<String>,
    /// Current point balance; habit and quest completions feed this.
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Name shown in headers and greetings; falls back to the username.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}
