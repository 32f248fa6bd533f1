//! Authentication request/response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token kind reported when the login response does not name one.
pub const DEFAULT_TOKEN_KIND: &str = "bearer";

/// Email/password pair sent to the register and login endpoints.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a successful login.
///
/// `token_kind` is informational; the client always sends the token as
/// `Authorization: Bearer {token}`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub token: String,
    pub token_kind: String,
}

impl fmt::Debug for AuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResult")
            .field("token", &"<redacted>")
            .field("token_kind", &self.token_kind)
            .finish()
    }
}

/// User record returned by registration. Every field is optional since the
/// server contract only promises a 2xx.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl RegisteredUser {
    /// Interpret a registration response body. Returns `None` when the body is
    /// not a JSON object.
    pub fn from_body(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}
