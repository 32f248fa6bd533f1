//! Login-response token extraction.
//!
//! The login endpoint does not commit to one response shape, so the token is
//! looked up across the known variants in a fixed order.

use serde_json::Value;

use crate::models::auth::DEFAULT_TOKEN_KIND;

/// Return the first non-empty string among `token`, `accessToken`,
/// `access_token` and `data.token`.
pub fn extract_token(body: &Value) -> Option<String> {
    let candidates = [
        body.get("token"),
        body.get("accessToken"),
        body.get("access_token"),
        body.get("data").and_then(|data| data.get("token")),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Token kind named by the response (`token_type` or `tokenType`), lowercased,
/// or `"bearer"`.
pub fn extract_token_kind(body: &Value) -> String {
    [body.get("token_type"), body.get("tokenType")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|kind| !kind.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| DEFAULT_TOKEN_KIND.to_string())
}
