//! Core library for blobstash.
//!
//! Provides the pieces every blobstash front-end shares:
//! - `auth`: durable single-slot storage for the bearer token
//! - `api`: the HTTP client for the register/login/logout/user-data endpoints
//! - `session`: login/logout orchestration over the two
//! - `models`: request and response types
//! - `config`: on-disk and environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthState, CredentialStore, StorageError};
pub use config::{Config, TokenStorage};
pub use models::{AuthResult, Credentials, RegisteredUser, StoredRecord};
pub use session::{LogoutOutcome, Session};
