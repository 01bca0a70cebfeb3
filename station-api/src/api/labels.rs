//! Label endpoints

use axum::extract::{Path, RawQuery, State};
use axum::Extension;
use station_common::api::Principal;

use super::{collection, single, JsonApi};
use crate::error::ApiResult;
use crate::views::ResourceKind;
use crate::AppState;

/// GET /label
pub async fn list_labels(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    collection(&state, &principal, raw.as_deref(), ResourceKind::Label).await
}

/// GET /label/:id
pub async fn get_label(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    single(&state, &principal, raw.as_deref(), ResourceKind::Label, &id).await
}
