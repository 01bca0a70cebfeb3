//! Show (playlist) view
//!
//! Events reach the view through the store's observer callback and are
//! rendered as embedded objects; a spin of a library album carries an
//! `album` relationship inside its attribute value.

use super::{identity, numeric_identity, ResourceKind, ViewContext};
use crate::flags::RelationshipFlags;
use crate::store::{EventKind, PlaylistObserver, Row};
use station_common::jsonapi::{AttrValue, Embedded, Link, Relationship, Resource};
use station_common::Result;
use tracing::debug;

pub const FIELDS: &[&str] = &["name", "airname", "date", "time", "rebroadcast", "events"];

/// Collects playlist events in air order
pub struct EventCollector {
    album_collection: String,
    events: Vec<AttrValue>,
}

impl EventCollector {
    pub fn new(album_collection: impl Into<String>) -> Self {
        Self {
            album_collection: album_collection.into(),
            events: Vec::new(),
        }
    }

    pub fn into_events(self) -> Vec<AttrValue> {
        self.events
    }
}

fn copy_text(mut event: Embedded, row: &Row, columns: &[&str]) -> Embedded {
    for &column in columns {
        if let Some(text) = row.text(column) {
            event = event.field(column, text);
        }
    }
    event
}

impl PlaylistObserver for EventCollector {
    fn observe(&mut self, kind: EventKind, row: &Row) {
        let event = match kind {
            EventKind::Spin => {
                let mut spin = copy_text(
                    Embedded::new().field("type", "spin"),
                    row,
                    &["artist", "track", "album", "label", "created"],
                );
                if let Some(tag) = row.integer("tag") {
                    let album = Relationship::to_one(
                        "album",
                        Some(Resource::new("album", tag.to_string())),
                    )
                    .with_link(
                        "related",
                        Link::new(format!("{}/{}", self.album_collection, tag)),
                    );
                    spin = spin.relationship(album);
                }
                spin
            }
            EventKind::Comment => copy_text(
                Embedded::new().field("type", "comment"),
                row,
                &["comment", "created"],
            ),
            EventKind::LogEvent => {
                let mut event = Embedded::new().field("type", "logEvent");
                if let Some(name) = row.text("comment") {
                    event = event.field("event", name);
                }
                copy_text(event, row, &["code", "created"])
            }
            EventKind::SetSeparator => {
                copy_text(Embedded::new().field("type", "break"), row, &["created"])
            }
        };
        self.events.push(AttrValue::Embedded(event));
    }
}

/// Show attributes and origin linkage, without any store reads
fn base(ctx: &ViewContext<'_>, row: &Row) -> Result<Resource> {
    let id = identity(row, "id", ResourceKind::Show)?;
    let mut resource = Resource::new("show", id.clone());

    ctx.put(&mut resource, "name", row.text("description"));
    ctx.put(&mut resource, "airname", row.text("airname"));
    ctx.put(&mut resource, "date", row.text("showdate"));
    ctx.put(&mut resource, "time", row.text("showtime"));
    ctx.put(&mut resource, "rebroadcast", Some(row.integer("origin").is_some()));

    Ok(resource)
}

fn finish(ctx: &ViewContext<'_>, resource: Resource) -> Resource {
    let link = Link::new(ctx.self_link(ResourceKind::Show, &resource.id));
    resource.with_link("self", link)
}

/// Render a show row
///
/// `events` carries child rows the caller already has (aggregated search
/// results); otherwise events are fetched when TRACKS is set.
pub async fn render(ctx: &ViewContext<'_>, row: &Row, events: Option<Vec<Row>>) -> Result<Resource> {
    let mut resource = base(ctx, row)?;
    let id = resource.id.clone();

    if ctx.fields.emits("show", "events") {
        let mut collector = EventCollector::new(ctx.collection_link(ResourceKind::Album));
        let collected = match events {
            Some(rows) => {
                for event in &rows {
                    let code = event.text("type").unwrap_or_default();
                    if let Some(kind) = EventKind::from_code(&code) {
                        collector.observe(kind, event);
                    }
                }
                true
            }
            None if ctx.flags.contains(RelationshipFlags::TRACKS) => {
                let show_id = numeric_identity(row, "id", ResourceKind::Show)?;
                ctx.store.get_tracks_with_observer(show_id, &mut collector).await?;
                true
            }
            None => false,
        };
        if collected {
            let events = collector.into_events();
            debug!(show = %id, count = events.len(), "Rendered show events");
            ctx.put(&mut resource, "events", Some(events));
        }
    }

    if ctx.emits_relationship(ResourceKind::Show, "origin") {
        let origin = match row.integer("origin") {
            Some(origin) if ctx.flags.contains(RelationshipFlags::ORIGIN) => {
                match ctx.store.get_playlist(origin).await? {
                    Some(origin_row) => Some(finish(ctx, base(ctx, &origin_row)?)),
                    None => Some(Resource::new("show", origin.to_string())),
                }
            }
            Some(origin) => Some(Resource::new("show", origin.to_string())),
            None => None,
        };
        let rel = Relationship::to_one("origin", origin);
        resource.add_relationship(ctx.relationship_links(rel, ResourceKind::Show, &id));
    }

    Ok(finish(ctx, resource))
}
