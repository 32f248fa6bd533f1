//! Request and response types for the blobstash API.
//!
//! Wire names follow the server (`user_id`, `json_data`, `timestamp`);
//! the Rust field names follow what the values mean to a client.

pub mod auth;
pub mod record;

pub use auth::{AuthResult, Credentials, RegisteredUser};
pub use record::{NewRecord, StoredRecord};
