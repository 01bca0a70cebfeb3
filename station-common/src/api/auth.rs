//! API key authentication
//!
//! # Architecture
//!
//! - Clients present a key in the `X-APIKEY` header
//! - Keys are never stored; configuration holds their SHA-256 digest
//! - A matching digest yields a [`Principal`] carrying the key's scopes
//! - Absence of a key yields the anonymous principal (public reads)
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions.
//! No HTTP framework dependencies (Axum, etc.) - those are in the service crate.

use crate::config::ApiKeyConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq)]
pub enum ApiAuthError {
    /// A key was presented but matches no configured digest
    UnknownKey,

    /// The operation needs an authenticated principal
    Unauthenticated,

    /// The principal lacks a scope the operation needs
    MissingScope(Scope),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::UnknownKey => write!(f, "Invalid API key"),
            ApiAuthError::Unauthenticated => write!(f, "Authentication required"),
            ApiAuthError::MissingScope(scope) => write!(f, "Missing scope: {}", scope),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Scopes and Principals
// ========================================

/// Elevated authorization scopes beyond ordinary reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Unrestricted federated search across every resource kind
    Search,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Search => write!(f, "search"),
        }
    }
}

/// Identity resolved for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Principal {
    /// Key name from configuration; `None` for anonymous clients
    pub name: Option<String>,
    pub scopes: HashSet<Scope>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>, scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            name: Some(name.into()),
            scopes: scopes.into_iter().collect(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.name.is_some()
    }

    /// Require authentication without any particular scope
    pub fn require_authenticated(&self) -> Result<(), ApiAuthError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ApiAuthError::Unauthenticated)
        }
    }

    /// Require a scope
    ///
    /// Anonymous clients get `Unauthenticated` rather than `MissingScope`, so a
    /// caller can tell "log in" apart from "your key cannot do this".
    pub fn require(&self, scope: Scope) -> Result<(), ApiAuthError> {
        self.require_authenticated()?;
        if self.scopes.contains(&scope) {
            Ok(())
        } else {
            Err(ApiAuthError::MissingScope(scope))
        }
    }
}

// ========================================
// Key Hashing and Lookup
// ========================================

/// Calculate the lowercase hex SHA-256 digest of an API key
///
/// # Examples
///
/// ```
/// use station_common::api::auth::hash_api_key;
///
/// let digest = hash_api_key("secret");
/// assert_eq!(digest.len(), 64); // SHA-256 is 64 hex chars
/// ```
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Configured keys indexed for lookup
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: Vec<ApiKeyConfig>,
}

impl KeyTable {
    pub fn new(keys: Vec<ApiKeyConfig>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolve the principal for an optional presented key
    pub fn authenticate(&self, presented: Option<&str>) -> Result<Principal, ApiAuthError> {
        let Some(key) = presented else {
            return Ok(Principal::anonymous());
        };

        let digest = hash_api_key(key.trim());
        self.keys
            .iter()
            .find(|k| k.key_sha256.eq_ignore_ascii_case(&digest))
            .map(|k| Principal::named(k.name.clone(), k.scopes.iter().copied()))
            .ok_or(ApiAuthError::UnknownKey)
    }
}

// ========================================
// Tests
// ========================================
