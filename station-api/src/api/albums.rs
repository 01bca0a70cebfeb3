//! Album endpoints
//!
//! Besides the collection and single-resource routes, albums expose their
//! relationships: `/album/:id/:rel` returns the related resources and
//! `/album/:id/relationships/:rel` only their linkage.

use axum::extract::{Path, RawQuery, State};
use axum::Extension;
use station_common::api::Principal;
use station_common::jsonapi::{Document, Link, Links, Resource};

use super::{collection, fetch_row, single, JsonApi, Prepared};
use crate::error::{ApiError, ApiResult};
use crate::views::{label, numeric_identity, review, ResourceKind};
use crate::AppState;

/// GET /album
pub async fn list_albums(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    collection(&state, &principal, raw.as_deref(), ResourceKind::Album).await
}

/// GET /album/:id
pub async fn get_album(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    single(&state, &principal, raw.as_deref(), ResourceKind::Album, &id).await
}

fn unknown(name: &str) -> ApiError {
    ApiError::UnknownRelationship {
        kind: ResourceKind::Album.type_name().to_string(),
        name: name.to_string(),
    }
}

/// GET /album/:id/:rel
pub async fn get_album_related(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, rel)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
) -> ApiResult<JsonApi> {
    let target = ResourceKind::Album
        .relationships()
        .iter()
        .find(|(name, _)| *name == rel)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| unknown(&rel))?;

    let prepared = Prepared::new(raw.as_deref(), target, false, &principal)?;
    let album = fetch_row(&state, ResourceKind::Album, &id).await?;
    let tag = numeric_identity(&album, "tag", ResourceKind::Album)?;
    let ctx = prepared.view(&state);
    let self_link = format!("{}/{}", ctx.self_link(ResourceKind::Album, &id), rel);

    let document = match target {
        ResourceKind::Label => {
            let label_row = match album.integer("pubkey") {
                Some(pubkey) => state.store.get_label(pubkey).await?,
                None => None,
            };
            let resource = label_row
                .map(|row| label::render(&ctx, &row))
                .transpose()?;
            Document::one(resource)
        }
        _ => {
            let with_body = prepared.fields.emits("review", "review");
            let mut reviews = Vec::new();
            for row in state.store.get_reviews(tag, with_body).await? {
                reviews.push(review::render(&ctx, &row).await?);
            }
            Document::many(reviews)
        }
    };

    let mut links = Links::new();
    links.insert("self".to_string(), Link::new(self_link));
    Ok(JsonApi(prepared.document(document.with_links(links))))
}

/// GET /album/:id/relationships/:rel
pub async fn get_album_relationship(
    State(state): State<AppState>,
    Path((id, rel)): Path<(String, String)>,
) -> ApiResult<JsonApi> {
    let album = fetch_row(&state, ResourceKind::Album, &id).await?;
    let base = format!("{}/{}/{}", state.base_path(), ResourceKind::Album.path(), id);

    let document = match rel.as_str() {
        "label" => Document::one(
            album
                .integer("pubkey")
                .map(|pubkey| Resource::new("label", pubkey.to_string())),
        ),
        "reviews" => {
            let tag = numeric_identity(&album, "tag", ResourceKind::Album)?;
            let rows = state.store.get_reviews(tag, false).await?;
            Document::many(
                rows.iter()
                    .filter_map(|r| r.text("id"))
                    .map(|review_id| Resource::new("review", review_id))
                    .collect(),
            )
        }
        other => return Err(unknown(other)),
    };

    let mut links = Links::new();
    links.insert(
        "self".to_string(),
        Link::new(format!("{}/relationships/{}", base, rel)),
    );
    links.insert("related".to_string(), Link::new(format!("{}/{}", base, rel)));
    Ok(JsonApi(document.with_links(links)))
}
