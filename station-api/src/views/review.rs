//! Review view

use super::{album, identity, ResourceKind, ViewContext};
use crate::flags::RelationshipFlags;
use crate::store::Row;
use station_common::jsonapi::{Link, Relationship, Resource};
use station_common::Result;

pub const FIELDS: &[&str] = &["airname", "date", "review"];

/// Build a review resource around an already-known album
///
/// With `album` unset the relationship carries linkage from the row's tag.
pub fn resource(ctx: &ViewContext<'_>, row: &Row, album: Option<Resource>) -> Result<Resource> {
    let id = identity(row, "id", ResourceKind::Review)?;
    let mut resource = Resource::new("review", id.clone());

    ctx.put(&mut resource, "airname", row.text("airname"));
    ctx.put(&mut resource, "date", row.text("created"));
    // bodies are only in rows fetched with them
    ctx.put(&mut resource, "review", row.text("review"));

    if ctx.emits_relationship(ResourceKind::Review, "album") {
        let album = album.or_else(|| row.text("tag").map(|tag| Resource::new("album", tag)));
        let rel = Relationship::to_one("album", album);
        resource.add_relationship(ctx.relationship_links(rel, ResourceKind::Review, &id));
    }

    let link = Link::new(ctx.self_link(ResourceKind::Review, &id));
    Ok(resource.with_link("self", link))
}

/// Render a review row, embedding its album when `include` asks for it
pub async fn render(ctx: &ViewContext<'_>, row: &Row) -> Result<Resource> {
    let mut album = None;

    if ctx.includes.contains(ResourceKind::Review, "album") {
        if let Some(tag) = row.integer("tag") {
            if let Some(album_row) = ctx.store.get_album(tag).await? {
                // the album's own reviews would lead back here
                let nested = ctx.with_flags(ctx.flags.without(RelationshipFlags::REVIEWS));
                album = Some(album::render(&nested, &album_row, None).await?);
            }
        }
    }

    resource(ctx, row, album)
}
