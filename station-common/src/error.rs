//! Errors raised below the HTTP layer
//!
//! The API crate wraps these in its own error document type; anything
//! without a client-facing meaning surfaces as an opaque 500.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading the config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// No row for the requested id
    #[error("Not found: {0}")]
    NotFound(String),

    /// A parameter the store cannot act on: bad sort key, malformed id
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A row handed to a view lacks a field the resource identity depends on
    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
