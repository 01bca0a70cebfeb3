//! Federated search
//!
//! One free-text query fans out across every bucket kind in a single store
//! call. Each non-empty bucket becomes a synthetic `search` resource whose
//! id is the MD5 of the bucket kind and its rows, so identical results keep
//! identical ids across requests while two buckets holding the same rows
//! stay distinct. MD5 here is a content fingerprint for caching and
//! diffing, not a security boundary.

use crate::error::{ApiError, ApiResult};
use crate::store::{Bucket, BucketKind, LibraryStore, Row};
use crate::views::{render_rows, ResourceKind, RowShape, ViewContext};
use md5::{Digest, Md5};
use station_common::api::{Principal, Scope};
use station_common::jsonapi::{Document, Link, Relationship, Resource};
use tracing::{debug, info};
use url::form_urlencoded;

/// Synthetic resource type of one bucket
pub const SEARCH_TYPE: &str = "search";

/// How a bucket's rows are rendered; buckets share their endpoint's views
pub fn bucket_shape(kind: BucketKind) -> RowShape {
    match kind {
        BucketKind::Tags | BucketKind::Albums | BucketKind::Artists => RowShape::Albums,
        BucketKind::Tracks | BucketKind::Compilations => RowShape::AlbumTracks,
        BucketKind::Labels => RowShape::Labels,
        BucketKind::Reviews => RowShape::Reviews,
        BucketKind::Playlists => RowShape::ShowEvents,
    }
}

/// Collection and filter a bucket can be deep-paged through
fn bucket_endpoint(kind: BucketKind) -> Option<(ResourceKind, &'static str)> {
    match kind {
        BucketKind::Tags => None,
        BucketKind::Albums => Some((ResourceKind::Album, "match(artist,album)")),
        BucketKind::Artists => Some((ResourceKind::Album, "match(artist)")),
        BucketKind::Tracks => Some((ResourceKind::Album, "match(track)")),
        BucketKind::Compilations => Some((ResourceKind::Album, "match(coll)")),
        BucketKind::Labels => Some((ResourceKind::Label, "match(name)")),
        BucketKind::Reviews => Some((ResourceKind::Review, "match(review)")),
        BucketKind::Playlists => Some((ResourceKind::Show, "match(event)")),
    }
}

/// Lowercase hex MD5 of the bucket kind and its serialized rows
pub fn bucket_id(kind: BucketKind, rows: &[Row]) -> ApiResult<String> {
    let bytes = serde_json::to_vec(rows)
        .map_err(|e| station_common::Error::Internal(format!("bucket rows: {}", e)))?;
    let digest = Md5::new()
        .chain_update(kind.name())
        .chain_update(b"\x1f")
        .chain_update(&bytes)
        .finalize();
    Ok(format!("{:x}", digest))
}

fn encode(query: &str) -> String {
    form_urlencoded::byte_serialize(query.as_bytes()).collect()
}

/// Deep-paging template; `{offset}` is left for the client to fill
fn template(ctx: &ViewContext<'_>, kind: BucketKind, query: &str, size: usize) -> Option<String> {
    let (collection, filter) = bucket_endpoint(kind)?;
    Some(format!(
        "{}?filter[{}]={}&page[size]={}&page[offset]={{offset}}",
        ctx.collection_link(collection),
        filter,
        encode(query),
        size
    ))
}

/// Page 0 of the bucket: the template at offset 0, or the search itself
/// for buckets without a collection of their own
fn first_href(ctx: &ViewContext<'_>, template: Option<&str>, query: &str, size: usize) -> String {
    match template {
        Some(template) => template.replace("{offset}", "0"),
        None => format!(
            "{}/{}?filter[*]={}&page[size]={}",
            ctx.base_path,
            SEARCH_TYPE,
            encode(query),
            size
        ),
    }
}

async fn bucket_resource(
    ctx: &ViewContext<'_>,
    bucket: &Bucket,
    query: &str,
    size: usize,
) -> ApiResult<Resource> {
    let name = bucket.kind.name();
    let id = bucket_id(bucket.kind, &bucket.rows)?;
    let members = render_rows(ctx, bucket_shape(bucket.kind), &bucket.rows).await?;

    let more = bucket.total.saturating_sub(bucket.rows.len());
    let template = template(ctx, bucket.kind, query, size);
    let mut first = Link::new(first_href(ctx, template.as_deref(), query, size))
        .with_meta("total", bucket.total)
        .with_meta("more", more)
        .with_meta("offset", 0);
    if let Some(template) = template {
        first = first.with_meta("template", template);
    }

    Ok(Resource::new(SEARCH_TYPE, id)
        .with_attribute("type", name)
        .with_attribute("total", bucket.total)
        .with_relationship(Relationship::to_many(name, members))
        .with_link("first", first))
}

/// Run one query across every bucket kind
///
/// Needs the `search` scope: anonymous callers get 401, keys without the
/// scope 403.
pub async fn federated(
    store: &dyn LibraryStore,
    ctx: &ViewContext<'_>,
    principal: &Principal,
    query: &str,
    size: usize,
) -> ApiResult<Document> {
    principal.require(Scope::Search)?;

    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::MissingFilter);
    }

    let result = store.search_full_text(None, query, size, 0).await?;
    info!(
        principal = principal.name.as_deref().unwrap_or("-"),
        total = result.total,
        buckets = result.buckets.len(),
        "Federated search"
    );

    let mut resources = Vec::with_capacity(result.buckets.len());
    let mut include = Vec::with_capacity(result.buckets.len());
    for bucket in result.buckets.iter().filter(|b| !b.rows.is_empty()) {
        debug!(bucket = bucket.kind.name(), total = bucket.total, "Rendering bucket");
        resources.push(bucket_resource(ctx, bucket, query, size).await?);
        include.push(bucket.kind.name().to_string());
    }

    Ok(Document::many(resources)
        .with_include(include)
        .with_meta("total", result.total))
}
