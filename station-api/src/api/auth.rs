//! API key middleware
//!
//! Resolves the `X-APIKEY` header to a [`Principal`] and stores it in the
//! request extensions. Requests without a key proceed anonymously; handlers
//! decide what anonymity permits.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use station_common::api::Principal;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the client's API key
pub const API_KEY_HEADER: &str = "x-apikey";

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = match request.headers().get(API_KEY_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| ApiError::InvalidApiKey)?.to_string()),
        None => None,
    };

    let principal: Principal = state
        .keys
        .authenticate(presented.as_deref())
        .map_err(|e| {
            warn!("Rejected API key: {}", e);
            ApiError::from(e)
        })?;

    if let Some(name) = &principal.name {
        debug!(key = %name, "Authenticated request");
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
