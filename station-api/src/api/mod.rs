//! HTTP API handlers for station-api

pub mod albums;
pub mod auth;
pub mod health;
pub mod labels;
pub mod playlists;
pub mod reviews;
pub mod search;

pub use auth::auth_middleware;
pub use health::health_routes;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use station_common::api::Principal;
use station_common::jsonapi::{content_type, encode_document, Document};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::fields::FieldVisibility;
use crate::flags::{self, IncludeSet, RelationshipFlags};
use crate::pagination::{fetch_page, PageRequest};
use crate::request::ApiQuery;
use crate::store::Row;
use crate::views::{render_rows, ResourceKind, RowShape, ViewContext};
use crate::AppState;

/// JSON:API document response
pub struct JsonApi(pub Document);

impl IntoResponse for JsonApi {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&encode_document(&self.0)) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type())],
                body,
            )
                .into_response(),
            Err(e) => {
                ApiError::Store(station_common::Error::Internal(format!("encode: {}", e)))
                    .into_response()
            }
        }
    }
}

/// Parameters of one request, resolved once
pub struct Prepared {
    pub query: ApiQuery,
    pub fields: FieldVisibility,
    pub includes: IncludeSet,
    pub flags: RelationshipFlags,
}

impl Prepared {
    /// Parse the query and derive field visibility and flags for `primary`
    pub fn new(
        raw: Option<&str>,
        primary: ResourceKind,
        single: bool,
        principal: &Principal,
    ) -> ApiResult<Self> {
        let query = ApiQuery::parse(raw)?;
        let includes = IncludeSet::parse(primary, &query.include)?;
        let fields = FieldVisibility::new(&query.fields, !includes.is_empty());
        let flags = flags::resolve(primary, single, &includes, &fields, principal)?;
        debug!(kind = primary.type_name(), single, ?flags, "Resolved request");

        Ok(Self {
            query,
            fields,
            includes,
            flags,
        })
    }

    pub fn view<'a>(&'a self, state: &'a AppState) -> ViewContext<'a> {
        ViewContext {
            store: state.store.as_ref(),
            base_path: state.base_path(),
            fields: &self.fields,
            includes: &self.includes,
            flags: self.flags,
        }
    }

    /// Document carrying this request's include paths
    pub fn document(&self, document: Document) -> Document {
        document.with_include(self.includes.paths().iter().cloned())
    }
}

fn shape_of(kind: ResourceKind) -> RowShape {
    match kind {
        ResourceKind::Album => RowShape::Albums,
        ResourceKind::Label => RowShape::Labels,
        ResourceKind::Review => RowShape::Reviews,
        ResourceKind::Show => RowShape::Shows,
    }
}

/// Integer key of a path id; anything else cannot exist
pub(crate) fn parse_id(kind: ResourceKind, id: &str) -> ApiResult<i64> {
    id.trim()
        .parse()
        .map_err(|_| ApiError::not_found(kind.type_name(), id))
}

/// Fetch the row behind `/<kind>/:id`
pub(crate) async fn fetch_row(state: &AppState, kind: ResourceKind, id: &str) -> ApiResult<Row> {
    let key = parse_id(kind, id)?;
    let store = state.store.as_ref();
    let row = match kind {
        ResourceKind::Album => store.get_album(key).await?,
        ResourceKind::Label => store.get_label(key).await?,
        ResourceKind::Review => store.get_review(key).await?,
        ResourceKind::Show => store.get_playlist(key).await?,
    };
    row.ok_or_else(|| ApiError::not_found(kind.type_name(), id))
}

/// Paginated collection of `kind`
pub(crate) async fn collection(
    state: &AppState,
    principal: &Principal,
    raw: Option<&str>,
    kind: ResourceKind,
) -> ApiResult<JsonApi> {
    let prepared = Prepared::new(raw, kind, false, principal)?;
    let request = PageRequest::parse(kind, &prepared.query, &state.settings)?;

    let page = fetch_page(
        state.store.as_ref(),
        kind,
        &request,
        &prepared.query,
        state.base_path(),
    )
    .await?;

    let ctx = prepared.view(state);
    let resources = render_rows(&ctx, page.shape, &page.rows).await?;

    let mut document = prepared.document(Document::many(resources).with_links(page.links));
    if let Some(window) = page.window {
        document = document
            .with_meta("total", window.total)
            .with_meta("more", window.more)
            .with_meta("offset", window.reported_offset());
    }
    Ok(JsonApi(document))
}

/// One resource of `kind`
pub(crate) async fn single(
    state: &AppState,
    principal: &Principal,
    raw: Option<&str>,
    kind: ResourceKind,
    id: &str,
) -> ApiResult<JsonApi> {
    let prepared = Prepared::new(raw, kind, true, principal)?;
    let row = fetch_row(state, kind, id).await?;

    let ctx = prepared.view(state);
    let resource = render_rows(&ctx, shape_of(kind), std::slice::from_ref(&row))
        .await?
        .pop();

    Ok(JsonApi(prepared.document(Document::one(resource))))
}
