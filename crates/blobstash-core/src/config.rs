//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, request timeout, where the bearer token is kept, and the last
//! email used to log in.
//!
//! Configuration is stored at `~/.config/blobstash/config.json`. The
//! `BLOBSTASH_API_URL`, `BLOBSTASH_TIMEOUT_SECS` and `BLOBSTASH_TOKEN_STORAGE`
//! environment variables override the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, FallbackBackend, FileBackend, MemoryBackend};

/// Application name used for config/data directory paths
const APP_NAME: &str = "blobstash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_BASE_URL: &str = "https://fitnessapi.sergeantservices.com";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "BLOBSTASH_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "BLOBSTASH_TIMEOUT_SECS";
pub const ENV_TOKEN_STORAGE: &str = "BLOBSTASH_TOKEN_STORAGE";

/// Where the bearer token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// `session.json` in the data directory
    #[default]
    File,
    /// OS keychain, falling back to the token file when no keychain is available
    Keyring,
    /// Not persisted; the token is lost when the process exits
    Memory,
}

impl FromStr for TokenStorage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenStorage::File),
            "keyring" => Ok(TokenStorage::Keyring),
            "memory" => Ok(TokenStorage::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown token storage '{}' (expected file, keyring or memory)",
                other
            )),
        }
    }
}

impl fmt::Display for TokenStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenStorage::File => "file",
            TokenStorage::Keyring => "keyring",
            TokenStorage::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    /// Directory holding the token file; defaults to the platform data dir
    pub token_dir: Option<PathBuf>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            token_dir: None,
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path` without environment overrides. A missing file yields
    /// the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory the token file lives in.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.token_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }

        if let Some(raw) = lookup(ENV_TOKEN_STORAGE) {
            match raw.parse::<TokenStorage>() {
                Ok(storage) => self.token_storage = storage,
                Err(e) => warn!(error = %e, "Ignoring invalid {}", ENV_TOKEN_STORAGE),
            }
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Request timeout; zero is treated as one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Build the credential store for the configured backend. The store is
    /// returned anonymous; call `load` to pick up a persisted token.
    pub fn credential_store(&self) -> Result<CredentialStore> {
        let store = match self.token_storage {
            TokenStorage::File => CredentialStore::new(FileBackend::in_dir(&self.data_dir()?)),
            TokenStorage::Keyring => {
                CredentialStore::new(FallbackBackend::keyring_then_file(&self.data_dir()?))
            }
            TokenStorage::Memory => CredentialStore::new(MemoryBackend::new()),
        };
        Ok(store)
    }
}
