//! Authentication module for holding the current bearer token.
//!
//! This module provides:
//! - `CredentialStore`: the single-slot token cache injected into the API client
//! - `TokenBackend`: durable storage behind the store (file, OS keychain with
//!   file fallback, memory)
//!
//! The token lives under the fixed storage key `auth_token`.

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{FallbackBackend, FileBackend, KeyringBackend, MemoryBackend, TokenBackend};
pub use error::StorageError;
pub use store::{AuthState, CredentialStore, TOKEN_KEY};
