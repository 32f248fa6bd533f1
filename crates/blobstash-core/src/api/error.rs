use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::StorageError;

/// Message shown for any transport-level failure (DNS, connect, TLS, timeout).
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error: unable to reach the API server. The server may be down or unreachable.";

/// Fields checked, in order, for a human-readable message in an error body.
const ERROR_MESSAGE_FIELDS: [&str; 3] = ["detail", "message", "error"];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{}", NETWORK_ERROR_MESSAGE)]
    Network {
        #[source]
        source: reqwest::Error,
    },

    #[error("{message} (HTTP {status})")]
    Http { status: StatusCode, message: String },

    #[error("Login succeeded but no token was found in the response: {0}")]
    AuthContract(String),

    #[error("Failed to initialize HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),

    #[error("Stored token cannot be sent in an Authorization header")]
    InvalidToken,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to store credentials: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Normalize a non-2xx response into `ApiError::Http`.
    ///
    /// The message comes from the first non-empty `detail`, `message` or
    /// `error` field of a JSON body, else from the status reason phrase.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| message_from_body(&value))
            .unwrap_or_else(|| status_text(status));

        ApiError::Http { status, message }
    }

    pub(crate) fn network(source: reqwest::Error) -> Self {
        ApiError::Network { source }
    }

    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server rejected the credential (401/403).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status().map(|s| s.as_u16()), Some(401) | Some(403))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }
}

fn message_from_body(body: &Value) -> Option<String> {
    ERROR_MESSAGE_FIELDS
        .iter()
        .filter_map(|field| body.get(*field))
        .find_map(message_from_field)
}

fn message_from_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        // FastAPI validation errors: [{"loc": [...], "msg": "...", "type": "..."}]
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .filter(|msg| !msg.is_empty())
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        Value::Object(_) => value
            .get("message")
            .or_else(|| value.get("msg"))
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
