//! Stored JSON records.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One saved JSON payload owned by a user account.
///
/// `id` and `owner_id` are assigned by the server. `created_at` is kept as the
/// server sent it (absent or `null` becomes `None`); use
/// [`StoredRecord::created_at_utc`] to interpret it. A missing `json_data`
/// reads as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(rename = "user_id")]
    pub owner_id: i64,
    #[serde(rename = "json_data", default)]
    pub payload: Value,
    #[serde(rename = "timestamp", default)]
    pub created_at: Option<String>,
}

impl StoredRecord {
    /// Parse `created_at` as RFC 3339, falling back to a naive ISO timestamp
    /// which is assumed to be UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Single-line rendering of the payload, truncated to `max_len` characters.
    pub fn payload_summary(&self, max_len: usize) -> String {
        let compact = self.payload.to_string();
        truncate_string(&compact, max_len)
    }
}

/// Request body for `POST /user-data`.
#[derive(Debug, Clone, Serialize)]
pub struct NewRecord {
    pub json_data: Value,
    pub timestamp: String,
}

impl NewRecord {
    /// Build a request body, stamping it with the current time when the caller
    /// supplies no timestamp.
    pub fn new(payload: Value, timestamp: Option<String>) -> Self {
        Self {
            json_data: payload,
            timestamp: timestamp.unwrap_or_else(now_timestamp),
        }
    }
}

/// Current UTC time as `2025-01-02T03:04:05.678Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
