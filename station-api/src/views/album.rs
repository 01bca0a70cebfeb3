//! Album view

use super::{identity, lookup, numeric_identity, review, truthy, ResourceKind, ViewContext};
use crate::flags::RelationshipFlags;
use crate::store::Row;
use serde_json::{Map, Value};
use station_common::jsonapi::{AttrValue, Link, Relationship, Resource};
use station_common::Result;

pub const FIELDS: &[&str] = &[
    "artist", "album", "category", "medium", "size", "created", "updated", "location", "bin",
    "coll", "tracks", "albumart",
];

/// Artist shown for collections
pub const VARIOUS_ARTISTS: &str = "Various Artists";

const CATEGORIES: &[(&str, &'static str)] = &[
    ("0", "General"),
    ("1", "Blues"),
    ("2", "Country"),
    ("3", "Dance"),
    ("4", "Hip-hop"),
    ("5", "Jazz"),
    ("6", "Classical"),
    ("7", "Reggae"),
    ("8", "Soundtracks"),
    ("9", "World"),
];

const MEDIA: &[(&str, &'static str)] = &[
    ("C", "CD"),
    ("M", "Cassette"),
    ("S", "7\""),
    ("T", "10\""),
    ("V", "12\""),
    ("D", "Digital"),
];

const SIZES: &[(&str, &'static str)] = &[
    ("E", "EP"),
    ("F", "Full"),
    ("S", "Single"),
    ("D", "Double"),
];

const LOCATIONS: &[(&str, &'static str)] = &[
    ("L", "Library"),
    ("M", "Missing"),
    ("E", "Pending Appr"),
    ("F", "Out for Review"),
    ("U", "Deaccessioned"),
    ("G", "Storage"),
    ("D", "Digital"),
];

/// Location code whose albums have a meaningful storage bin
const STORAGE: &str = "G";

/// Render an album row
///
/// `tracks` carries child rows the caller already has (aggregated search
/// results); otherwise tracks are fetched when TRACKS is set.
pub async fn render(ctx: &ViewContext<'_>, row: &Row, tracks: Option<Vec<Row>>) -> Result<Resource> {
    let tag = identity(row, "tag", ResourceKind::Album)?;
    let mut resource = Resource::new("album", tag.clone());
    let coll = truthy(row, "iscoll");

    let artist = if coll {
        Some(VARIOUS_ARTISTS.to_string())
    } else {
        row.text("artist")
    };
    ctx.put(&mut resource, "artist", artist);
    ctx.put(&mut resource, "album", row.text("album"));
    ctx.put(&mut resource, "category", lookup(CATEGORIES, row, "category"));
    ctx.put(&mut resource, "medium", lookup(MEDIA, row, "medium"));
    ctx.put(&mut resource, "size", lookup(SIZES, row, "size"));
    ctx.put(&mut resource, "created", row.text("created"));
    ctx.put(&mut resource, "updated", row.text("updated"));
    ctx.put(&mut resource, "location", lookup(LOCATIONS, row, "location"));

    let in_storage = row
        .text("location")
        .is_some_and(|code| code.eq_ignore_ascii_case(STORAGE));
    let bin = match row.text("bin") {
        Some(bin) if in_storage => AttrValue::from(bin),
        _ => AttrValue::null(),
    };
    ctx.put(&mut resource, "bin", Some(bin));
    ctx.put(&mut resource, "coll", Some(coll));

    if ctx.fields.emits("album", "tracks") {
        let tracks = match tracks {
            Some(rows) => Some(rows),
            None if ctx.flags.contains(RelationshipFlags::TRACKS) => {
                let tag_number = numeric_identity(row, "tag", ResourceKind::Album)?;
                Some(ctx.store.get_album_tracks(tag_number).await?)
            }
            None => None,
        };
        if let Some(rows) = tracks {
            let list: Vec<AttrValue> = rows.iter().map(|t| track_value(t, coll)).collect();
            ctx.put(&mut resource, "tracks", Some(list));
        }
    }

    if ctx.flags.contains(RelationshipFlags::ARTWORK) {
        let tag_number = numeric_identity(row, "tag", ResourceKind::Album)?;
        let art = ctx.store.get_artwork(tag_number).await?;
        ctx.put(&mut resource, "albumart", art);
    }

    if ctx.emits_relationship(ResourceKind::Album, "label") {
        let related = match row.integer("pubkey") {
            Some(pubkey) if ctx.flags.contains(RelationshipFlags::LABEL) => {
                match ctx.store.get_label(pubkey).await? {
                    Some(label_row) => Some(super::label::render(ctx, &label_row)?),
                    None => Some(Resource::new("label", pubkey.to_string())),
                }
            }
            Some(pubkey) => Some(Resource::new("label", pubkey.to_string())),
            None => None,
        };
        let rel = Relationship::to_one("label", related);
        resource.add_relationship(ctx.relationship_links(rel, ResourceKind::Album, &tag));
    }

    if ctx.emits_relationship(ResourceKind::Album, "reviews") {
        let rel = if ctx.flags.contains(RelationshipFlags::REVIEWS) {
            let with_body = ctx.flags.contains(RelationshipFlags::REVIEWS_WITH_BODY);
            let tag_number = numeric_identity(row, "tag", ResourceKind::Album)?;
            let rows = ctx.store.get_reviews(tag_number, with_body).await?;
            let owner = Resource::new("album", tag.clone());
            let reviews = rows
                .iter()
                .map(|r| review::resource(ctx, r, Some(owner.clone())))
                .collect::<Result<Vec<_>>>()?;
            Relationship::to_many("reviews", reviews)
        } else {
            Relationship::links_only("reviews")
        };
        resource.add_relationship(ctx.relationship_links(rel, ResourceKind::Album, &tag));
    }

    let link = Link::new(ctx.self_link(ResourceKind::Album, &tag));
    Ok(resource.with_link("self", link))
}

/// One track as a plain attribute object
fn track_value(row: &Row, coll: bool) -> AttrValue {
    let mut track = Map::new();
    if let Some(seq) = row.integer("seq") {
        track.insert("seq".to_string(), Value::from(seq));
    }
    for column in ["artist", "track", "duration", "url"] {
        // Only collections credit a performer per track
        if column == "artist" && !coll {
            continue;
        }
        if let Some(text) = row.text(column) {
            track.insert(column.to_string(), Value::String(text));
        }
    }
    AttrValue::Value(Value::Object(track))
}
