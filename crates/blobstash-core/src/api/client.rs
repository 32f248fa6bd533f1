//! API client for the blobstash REST API.
//!
//! This module provides the `ApiClient` struct for the four account and
//! record operations plus logout. Every request carries
//! `Content-Type: application/json` and, when the injected `CredentialStore`
//! holds a token, `Authorization: Bearer {token}`.

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::models::{AuthResult, Credentials, NewRecord, RegisteredUser, StoredRecord};

use super::token::{extract_token, extract_token_kind};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const REGISTER_PATH: &str = "/auth/register";
const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const RECORDS_PATH: &str = "/user-data";

const USER_AGENT: &str = concat!("blobstash/", env!("CARGO_PKG_VERSION"));

/// API client for the blobstash service.
/// Clone is cheap - reqwest::Client and CredentialStore are both shared handles.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
}

impl ApiClient {
    /// Create a client for the configured base URL and timeout.
    pub fn new(config: &Config, store: CredentialStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::ClientSetup)?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            store,
        })
    }

    /// Create a client against `base_url` with default settings.
    pub fn with_base_url(base_url: &str, store: CredentialStore) -> Result<Self, ApiError> {
        let config = Config {
            api_base_url: base_url.to_string(),
            ..Config::default()
        };
        Self::new(&config, store)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    // ===== Account =====

    /// Create an account. No token is issued; the caller logs in separately.
    ///
    /// Any 2xx succeeds. The user record is returned when the body holds one.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<RegisteredUser>, ApiError> {
        let body = Credentials::new(email, password);
        let response = self.send(Method::POST, REGISTER_PATH, Some(&body)).await?;
        let text = Self::read_body(response).await?;
        Ok(RegisteredUser::from_body(&text))
    }

    /// Exchange email/password for a bearer token.
    ///
    /// Does not touch the credential store; persisting the token is the
    /// caller's job.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, ApiError> {
        let body = Credentials::new(email, password);
        let response = self.send(Method::POST, LOGIN_PATH, Some(&body)).await?;
        let text = Self::read_body(response).await?;

        let value: Value = serde_json::from_str(&text).map_err(|_| {
            ApiError::AuthContract("login response is not JSON".to_string())
        })?;

        let token = extract_token(&value).ok_or_else(|| {
            ApiError::AuthContract(format!(
                "expected one of token, accessToken, access_token, data.token (got {})",
                describe_keys(&value)
            ))
        })?;

        debug!("Login succeeded");
        Ok(AuthResult {
            token,
            token_kind: extract_token_kind(&value),
        })
    }

    /// Tell the server the current token is done with. Best-effort: callers
    /// clear the local credential whatever this returns.
    pub async fn logout(&self) -> Result<(), ApiError> {
        // Body ignored
        self.send::<()>(Method::POST, LOGOUT_PATH, None).await?;
        Ok(())
    }

    // ===== Records =====

    /// Store `payload`, stamped with `timestamp` or the current time.
    pub async fn save_record(
        &self,
        payload: Value,
        timestamp: Option<String>,
    ) -> Result<StoredRecord, ApiError> {
        let body = NewRecord::new(payload, timestamp);
        let response = self.send(Method::POST, RECORDS_PATH, Some(&body)).await?;
        let text = Self::read_body(response).await?;

        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("saved record: {}", e)))
    }

    /// All records for the current account, as the server returned them.
    ///
    /// A body that is not a JSON array yields an empty list.
    pub async fn list_records(&self) -> Result<Vec<StoredRecord>, ApiError> {
        let response = self.send::<()>(Method::GET, RECORDS_PATH, None).await?;
        let text = Self::read_body(response).await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Array(_)) => serde_json::from_value(value)
                .map_err(|e| ApiError::InvalidResponse(format!("record list: {}", e))),
            _ => {
                debug!("Record list response is not an array, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    // ===== Request plumbing =====

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = self.store.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidToken)?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<RequestBuilder, ApiError> {
        let builder = self
            .client
            .request(method, self.url(path))
            .headers(self.auth_headers()?);
        Ok(match body {
            Some(body) => builder.json(body),
            None => builder,
        })
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        debug!(
            method = method.as_str(),
            path,
            authenticated = self.store.is_authenticated(),
            "Sending request"
        );
        let response = self
            .request(method, path, body)?
            .send()
            .await
            .map_err(ApiError::network)?;

        Self::check_response(response).await
    }

    /// Check if response is successful, returning a normalized error if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            debug!(%status, "Request succeeded");
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn read_body(response: Response) -> Result<String, ApiError> {
        response.text().await.map_err(ApiError::network)
    }
}

/// Top-level keys of a JSON object, for error messages that must not echo values.
fn describe_keys(value: &Value) -> String {
    match value.as_object() {
        Some(map) if map.is_empty() => "empty object".to_string(),
        Some(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("keys: {}", keys.join(", "))
        }
        None => "non-object body".to_string(),
    }
}
