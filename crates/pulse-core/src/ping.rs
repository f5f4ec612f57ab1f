//! Ping wire payload and stored row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The query-string parameters a client sends to `POST /ping`.
///
/// Every field is optional on the wire; a missing or malformed `userId`
/// makes the whole request a silent no-op rather than an error, because
/// clients fire pings blindly and never look at the response.
#[derive(Debug, Clone, Deserialize)]
pub struct PingParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub ip: Option<String>,
    #[serde(rename = "beakerVersion")]
    pub beaker_version: Option<String>,
    pub os: Option<String>,
    /// Receipt-time override in Unix milliseconds. Honored only when the
    /// server runs in debug mode; production always stamps wall clock.
    pub date: Option<i64>,
}

/// A stored heartbeat observation; mirrors the `pings` table columns.
#[derive(Debug, Clone, Serialize)]
pub struct Ping {
    pub id: i64,
    pub user_id: String,
    pub date: DateTime<Utc>,
    /// True iff this was the first row ever recorded for `user_id` at the
    /// moment it was inserted. Set once, never recomputed.
    pub is_first_ping: bool,
    pub beaker_version: Option<String>,
    pub os: Option<String>,
    pub ip: Option<String>,
}

/// Validate a client-supplied user id: non-empty lowercase hex.
///
/// Anything else is silently skipped at the ingestion boundary.
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}
