//! # Station Common Library
//!
//! Shared code for the station library services:
//! - Error types
//! - Configuration loading
//! - API key authentication primitives
//! - JSON:API document model and the `xa` extension codec

pub mod api;
pub mod config;
pub mod error;
pub mod jsonapi;

pub use error::{Error, Result};
