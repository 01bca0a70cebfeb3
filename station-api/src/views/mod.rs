//! Resource views
//!
//! One view per resource type turns one store row into one [`Resource`].
//! Attribute lists are fixed per type; optional relationship data is only
//! fetched when the request's [`RelationshipFlags`] ask for it.

pub mod album;
pub mod label;
pub mod review;
pub mod show;

use crate::aggregate::{aggregate, Layout};
use crate::fields::FieldVisibility;
use crate::flags::{IncludeSet, RelationshipFlags};
use crate::store::{LibraryStore, Row};
use serde_json::Value;
use station_common::jsonapi::{AttrValue, Link, Relationship, Resource};
use station_common::{Error, Result};

/// Resource types served by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Album,
    Label,
    Review,
    Show,
}

impl ResourceKind {
    /// JSON:API `type` member
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Album => "album",
            ResourceKind::Label => "label",
            ResourceKind::Review => "review",
            ResourceKind::Show => "show",
        }
    }

    /// Collection path segment
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Show => "playlist",
            other => other.type_name(),
        }
    }

    /// Includable relationships and their target types
    pub fn relationships(self) -> &'static [(&'static str, ResourceKind)] {
        match self {
            ResourceKind::Album => &[
                ("label", ResourceKind::Label),
                ("reviews", ResourceKind::Review),
            ],
            ResourceKind::Label => &[],
            ResourceKind::Review => &[("album", ResourceKind::Album)],
            ResourceKind::Show => &[("origin", ResourceKind::Show)],
        }
    }

    /// Attribute names, for deny-list accounting
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Album => album::FIELDS,
            ResourceKind::Label => label::FIELDS,
            ResourceKind::Review => review::FIELDS,
            ResourceKind::Show => show::FIELDS,
        }
    }

    /// Every field name of the type, attributes and relationships alike
    pub fn field_names(self) -> Vec<&'static str> {
        let links_only: &[&str] = match self {
            ResourceKind::Label => &["albums"],
            _ => &[],
        };
        self.attributes()
            .iter()
            .copied()
            .chain(self.relationships().iter().map(|&(name, _)| name))
            .chain(links_only.iter().copied())
            .collect()
    }
}

/// Everything a view needs besides its row
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub store: &'a dyn LibraryStore,
    /// Prefix of every generated link, e.g. `/api/v2`
    pub base_path: &'a str,
    pub fields: &'a FieldVisibility,
    pub includes: &'a IncludeSet,
    pub flags: RelationshipFlags,
}

impl<'a> ViewContext<'a> {
    pub fn with_flags(self, flags: RelationshipFlags) -> Self {
        Self { flags, ..self }
    }

    pub fn collection_link(&self, kind: ResourceKind) -> String {
        format!("{}/{}", self.base_path, kind.path())
    }

    pub fn self_link(&self, kind: ResourceKind, id: &str) -> String {
        format!("{}/{}", self.collection_link(kind), id)
    }

    /// `self`/`related` links of a relationship
    pub fn relationship_links(
        &self,
        relationship: Relationship,
        kind: ResourceKind,
        id: &str,
    ) -> Relationship {
        let owner = self.self_link(kind, id);
        let name = relationship.name.clone();
        relationship
            .with_link("self", Link::new(format!("{}/relationships/{}", owner, name)))
            .with_link("related", Link::new(format!("{}/{}", owner, name)))
    }

    /// Whether relationship `name` goes on the wire for `kind`
    pub fn emits_relationship(&self, kind: ResourceKind, name: &str) -> bool {
        let type_name = kind.type_name();
        !self.fields.strips_relationships(type_name, &kind.field_names())
            && self.fields.emits(type_name, name)
    }

    /// Set an attribute when visible and present
    pub fn put<V: Into<AttrValue>>(&self, resource: &mut Resource, name: &str, value: Option<V>) {
        if let Some(value) = value {
            if self.fields.emits(&resource.kind, name) {
                resource.set_attribute(name, value);
            }
        }
    }
}

/// Shape of the rows a pager or search bucket produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Albums,
    /// Album rows repeated per matching track
    AlbumTracks,
    Labels,
    Reviews,
    Shows,
    /// Show rows repeated per matching event
    ShowEvents,
}

/// Render a page of rows into resources
pub async fn render_rows(ctx: &ViewContext<'_>, shape: RowShape, rows: &[Row]) -> Result<Vec<Resource>> {
    let mut resources = Vec::with_capacity(rows.len());

    match shape {
        RowShape::Albums => {
            for row in rows {
                resources.push(album::render(ctx, row, None).await?);
            }
        }
        RowShape::AlbumTracks => {
            for parent in aggregate(rows, Layout::Tracks) {
                resources.push(album::render(ctx, &parent.parent, Some(parent.children)).await?);
            }
        }
        RowShape::Labels => {
            for row in rows {
                resources.push(label::render(ctx, row)?);
            }
        }
        RowShape::Reviews => {
            for row in rows {
                resources.push(review::render(ctx, row).await?);
            }
        }
        RowShape::Shows => {
            for row in rows {
                resources.push(show::render(ctx, row, None).await?);
            }
        }
        RowShape::ShowEvents => {
            for parent in aggregate(rows, Layout::Events) {
                resources.push(show::render(ctx, &parent.parent, Some(parent.children)).await?);
            }
        }
    }

    Ok(resources)
}

/// Identity column of a row; its absence breaks the store contract
pub fn identity(row: &Row, column: &str, kind: ResourceKind) -> Result<String> {
    row.text(column).ok_or_else(|| {
        Error::Contract(format!(
            "{} row has no '{}' column",
            kind.type_name(),
            column
        ))
    })
}

/// Integer key column a store lookup is addressed by
pub fn numeric_identity(row: &Row, column: &str, kind: ResourceKind) -> Result<i64> {
    row.integer(column).ok_or_else(|| {
        Error::Contract(format!(
            "{} row has no numeric '{}' column",
            kind.type_name(),
            column
        ))
    })
}

/// Single-character flag coercion (`1`, `Y`, `T`, any case)
pub fn truthy(row: &Row, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_uppercase().as_str(),
            "1" | "Y" | "T" | "YES" | "TRUE"
        ),
        _ => false,
    }
}

/// Code → label lookup; unknown codes pass through unchanged
pub fn lookup(table: &[(&str, &'static str)], row: &Row, column: &str) -> Option<String> {
    let code = row.text(column)?;
    Some(
        table
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(&code))
            .map(|(_, label)| label.to_string())
            .unwrap_or(code),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy() {
        let row = Row::new()
            .with("a", "Y")
            .with("b", "t")
            .with("c", "0")
            .with("d", 1)
            .with("e", "N");
        assert!(truthy(&row, "a"));
        assert!(truthy(&row, "b"));
        assert!(!truthy(&row, "c"));
        assert!(truthy(&row, "d"));
        assert!(!truthy(&row, "e"));
        assert!(!truthy(&row, "missing"));
    }

    #[test]
    fn test_lookup_passes_unknown_codes() {
        let table = [("C", "CD"), ("V", "Vinyl")];
        let row = Row::new().with("medium", "c").with("other", "Q");
        assert_eq!(lookup(&table, &row, "medium").as_deref(), Some("CD"));
        assert_eq!(lookup(&table, &row, "other").as_deref(), Some("Q"));
        assert_eq!(lookup(&table, &row, "missing"), None);
    }

    #[test]
    fn test_identity_missing_is_contract_error() {
        let row = Row::new().with("artist", "X");
        assert!(matches!(
            identity(&row, "tag", ResourceKind::Album),
            Err(Error::Contract(_))
        ));
    }

    #[test]
    fn test_numeric_identity_rejects_text_keys() {
        let row = Row::new().with("tag", "1006").with("id", "ten");
        assert_eq!(numeric_identity(&row, "tag", ResourceKind::Album).unwrap(), 1006);
        assert!(matches!(
            numeric_identity(&row, "id", ResourceKind::Show),
            Err(Error::Contract(_))
        ));
    }

    #[test]
    fn test_field_names_cover_relationships() {
        let album = ResourceKind::Album.field_names();
        assert!(album.contains(&"artist"));
        assert!(album.contains(&"label"));
        assert!(album.contains(&"reviews"));
        assert!(ResourceKind::Label.field_names().contains(&"albums"));
    }

    #[test]
    fn test_show_collection_path() {
        assert_eq!(ResourceKind::Show.type_name(), "show");
        assert_eq!(ResourceKind::Show.path(), "playlist");
    }
}
