//! Playlist endpoints
//!
//! Playlists are served as `show` resources; events ride inside the
//! `events` attribute.

use axum::extract::{Path, RawQuery, State};
use axum::Extension;
use station_common::api::Principal;

use super::{collection, single, JsonApi};
use crate::error::ApiResult;
use crate::views::ResourceKind;
use crate::AppState;

/// GET /playlist
pub async fn list_playlists(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    collection(&state, &principal, raw.as_deref(), ResourceKind::Show).await
}

/// GET /playlist/:id
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    single(&state, &principal, raw.as_deref(), ResourceKind::Show, &id).await
}
