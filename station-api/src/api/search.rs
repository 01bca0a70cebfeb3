//! Federated search endpoint

use axum::extract::{RawQuery, State};
use axum::Extension;
use station_common::api::{Principal, Scope};

use super::{JsonApi, Prepared};
use crate::error::{ApiError, ApiResult};
use crate::search::federated;
use crate::views::ResourceKind;
use crate::AppState;

/// GET /search?filter[*]=<query>
///
/// Bucket members render as album, label, review and show resources, so
/// their `fields[...]` directives apply as on the dedicated endpoints.
pub async fn search(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    // Checked before the query is parsed
    principal.require(Scope::Search)?;

    let prepared = Prepared::new(raw.as_deref(), ResourceKind::Album, false, &principal)?;
    let query = prepared
        .query
        .filter("*")
        .ok_or(ApiError::MissingFilter)?
        .to_string();
    let size = prepared.query.page_size(&state.settings)?;

    let ctx = prepared.view(&state);
    let document = federated(state.store.as_ref(), &ctx, &principal, &query, size).await?;
    Ok(JsonApi(document))
}
