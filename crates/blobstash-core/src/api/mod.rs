//! REST API client module for the blobstash service.
//!
//! This module provides the `ApiClient` for registering, logging in and out,
//! and saving and listing JSON records.
//!
//! The API uses bearer token authentication; the token is read from the
//! `CredentialStore` the client is built with.

pub mod client;
pub mod error;
pub mod token;

pub use client::ApiClient;
pub use error::ApiError;
pub use reqwest::StatusCode;
pub use token::{extract_token, extract_token_kind};
