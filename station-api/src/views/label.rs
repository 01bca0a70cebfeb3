//! Label view

use super::{identity, truthy, ResourceKind, ViewContext};
use crate::store::Row;
use station_common::jsonapi::{Link, Relationship, Resource};
use station_common::Result;

pub const FIELDS: &[&str] = &[
    "name", "attention", "address", "city", "state", "zip", "phone", "fax", "email", "url",
    "international", "pcreated", "modified",
];

/// Render a label row
///
/// Labels need no extra reads: their albums are reachable only through
/// the filtered album collection.
pub fn render(ctx: &ViewContext<'_>, row: &Row) -> Result<Resource> {
    let pubkey = identity(row, "pubkey", ResourceKind::Label)?;
    let mut resource = Resource::new("label", pubkey.clone());

    for &field in FIELDS {
        match field {
            "international" => ctx.put(&mut resource, field, Some(truthy(row, field))),
            _ => ctx.put(&mut resource, field, row.text(field)),
        }
    }

    if ctx.emits_relationship(ResourceKind::Label, "albums") {
        let albums = Relationship::links_only("albums").with_link(
            "related",
            Link::new(format!(
                "{}?filter[label.id]={}",
                ctx.collection_link(ResourceKind::Album),
                pubkey
            )),
        );
        resource.add_relationship(albums);
    }

    let link = Link::new(ctx.self_link(ResourceKind::Label, &pubkey));
    Ok(resource.with_link("self", link))
}
