//! Login/logout orchestration over an `ApiClient` and its `CredentialStore`.
//!
//! `Session` is what a UI holds: it loads the persisted token at startup,
//! saves the token after a successful login, and always clears it on logout
//! even when the server cannot be reached.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthState, CredentialStore, StorageError};
use crate::config::Config;
use crate::models::{AuthResult, RegisteredUser, StoredRecord};

/// What happened on logout. The local credential is gone either way.
#[derive(Debug)]
pub struct LogoutOutcome {
    /// Failure of the remote logout call, if any
    pub remote_error: Option<ApiError>,
}

impl LogoutOutcome {
    /// True when the server also acknowledged the logout.
    pub fn is_clean(&self) -> bool {
        self.remote_error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    api: ApiClient,
    store: CredentialStore,
}

impl Session {
    /// Build the configured token backend, load any persisted token, and
    /// create the client.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let store = config.credential_store()?;
        store.load();
        let api = ApiClient::new(config, store.clone())?;
        debug!(state = ?store.state(), base_url = api.base_url(), "Session opened");
        Ok(Self { api, store })
    }

    /// Wrap an existing client, sharing its credential store.
    pub fn from_client(api: ApiClient) -> Self {
        let store = api.credential_store().clone();
        Self { api, store }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<RegisteredUser>, ApiError> {
        let user = self.api.register(email, password).await?;
        info!("Registration succeeded");
        Ok(user)
    }

    /// Log in and persist the returned token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, ApiError> {
        let auth = self.api.login(email, password).await?;
        self.persist(auth.token.clone()).await?;
        info!(token_kind = %auth.token_kind, "Logged in");
        Ok(auth)
    }

    /// Best-effort remote logout, then clear the local credential.
    ///
    /// Only a failure to clear local storage is an error.
    pub async fn logout(&self) -> Result<LogoutOutcome, StorageError> {
        let remote_error = match self.api.logout().await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
                Some(e)
            }
        };

        self.forget().await?;
        info!("Logged out");
        Ok(LogoutOutcome { remote_error })
    }

    pub async fn save_record(
        &self,
        payload: Value,
        timestamp: Option<String>,
    ) -> Result<StoredRecord, ApiError> {
        self.api.save_record(payload, timestamp).await
    }

    pub async fn list_records(&self) -> Result<Vec<StoredRecord>, ApiError> {
        self.api.list_records().await
    }

    // Backends do blocking file or keychain I/O
    async fn persist(&self, token: String) -> Result<(), StorageError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(&token))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }

    async fn forget(&self) -> Result<(), StorageError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.clear())
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }
}
