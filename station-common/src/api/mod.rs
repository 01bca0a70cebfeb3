//! API-key authentication shared with the HTTP service
//!
//! Framework-free: the service adapts [`KeyTable`] into axum middleware.

pub mod auth;

pub use auth::{hash_api_key, ApiAuthError, KeyTable, Principal, Scope};
