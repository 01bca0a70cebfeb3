//! Review endpoints
//!
//! Only public reviews are reachable; the store never returns private ones.

use axum::extract::{Path, RawQuery, State};
use axum::Extension;
use station_common::api::Principal;

use super::{collection, single, JsonApi};
use crate::error::ApiResult;
use crate::views::ResourceKind;
use crate::AppState;

/// GET /review
pub async fn list_reviews(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    collection(&state, &principal, raw.as_deref(), ResourceKind::Review).await
}

/// GET /review/:id
pub async fn get_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    single(&state, &principal, raw.as_deref(), ResourceKind::Review, &id).await
}
