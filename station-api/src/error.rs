//! Error taxonomy of the JSON:API layer
//!
//! Every failure leaves the service as a JSON:API error document. Client
//! errors are 400, missing resources 404, authorization failures 401/403.
//! Collaborator failures propagate unmodified and become a 500.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use station_common::api::{ApiAuthError, Scope};
use station_common::jsonapi::{content_type, ErrorDocument};
use thiserror::Error;
use tracing::error;

/// Result type of request handling
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unsupported pagination profile: {0}")]
    UnsupportedProfile(String),

    #[error("Missing required filter")]
    MissingFilter,

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Unknown relationship '{name}' for type {kind}")]
    UnknownRelationship { kind: String, name: String },

    #[error("Invalid value for {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Missing scope: {0}")]
    Forbidden(Scope),

    #[error(transparent)]
    Store(#[from] station_common::Error),
}

impl ApiError {
    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedProfile(_)
            | ApiError::MissingFilter
            | ApiError::UnknownFilter(_)
            | ApiError::UnknownRelationship { .. }
            | ApiError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Store(station_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(station_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::UnsupportedProfile(_) => "Unsupported pagination profile",
            ApiError::MissingFilter => "Missing required filter",
            ApiError::UnknownFilter(_) => "Unknown filter",
            ApiError::UnknownRelationship { .. } => "Unknown relationship",
            ApiError::InvalidParameter { .. } => "Invalid parameter",
            ApiError::NotFound { .. } => "Not found",
            ApiError::Unauthenticated => "Unauthorized",
            ApiError::InvalidApiKey => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Store(station_common::Error::InvalidInput(_)) => "Invalid parameter",
            ApiError::Store(station_common::Error::NotFound(_)) => "Not found",
            ApiError::Store(_) => "Internal server error",
        }
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err {
            ApiAuthError::UnknownKey => ApiError::InvalidApiKey,
            ApiAuthError::Unauthenticated => ApiError::Unauthenticated,
            ApiAuthError::MissingScope(scope) => ApiError::Forbidden(scope),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internals are logged, not leaked
        let detail = if status.is_server_error() {
            error!("Request failed: {}", self);
            None
        } else {
            Some(self.to_string())
        };

        let document = ErrorDocument::single(status.as_u16(), self.title(), detail);
        match serde_json::to_vec(&document) {
            Ok(body) => (status, [(header::CONTENT_TYPE, content_type())], body).into_response(),
            Err(e) => {
                error!("Error document not encodable: {}", e);
                status.into_response()
            }
        }
    }
}
