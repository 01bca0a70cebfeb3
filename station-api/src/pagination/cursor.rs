//! Cursor pagination
//!
//! A cursor is the sort key of one row: `(artist, album, tag)` for albums,
//! `(name, pubkey)` for labels. Pages are addressed relative to a key rather
//! than a position, so inserts and deletes elsewhere never make a traversing
//! client skip or repeat rows.

use super::Page;
use crate::error::{ApiError, ApiResult};
use crate::request::ApiQuery;
use crate::store::{LibraryStore, ListOp, Row};
use crate::views::{ResourceKind, RowShape};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use station_common::jsonapi::{Link, Links};
use tracing::debug;

/// Joins key values; never appears in library text
pub const DELIMITER: char = '\u{1f}';

/// Sort-derived position of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorKey(Vec<String>);

impl CursorKey {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Key of a row in `kind`'s sort order
    pub fn from_row(kind: ResourceKind, row: &Row) -> ApiResult<Self> {
        let values = key_columns(kind)
            .iter()
            .map(|&column| {
                row.text(column).or_else(|| {
                    // empty text sorts first; only a missing key column is fatal
                    row.get(column).map(|_| String::new())
                })
                .ok_or_else(|| {
                    station_common::Error::Contract(format!(
                        "{} row has no '{}' column",
                        kind.type_name(),
                        column
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(values))
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn into_values(self) -> Vec<String> {
        self.0
    }

    /// Opaque wire form
    pub fn encode(&self) -> String {
        let joined = self.0.join(&DELIMITER.to_string());
        URL_SAFE_NO_PAD.encode(joined.as_bytes())
    }

    /// Parse the wire form sent in `page[<param>]`
    pub fn decode(kind: ResourceKind, param: &str, text: &str) -> ApiResult<Self> {
        let invalid = |reason: &str| ApiError::invalid(format!("page[{}]", param), reason);

        let bytes = URL_SAFE_NO_PAD
            .decode(text.trim())
            .map_err(|_| invalid("malformed cursor"))?;
        let joined = String::from_utf8(bytes).map_err(|_| invalid("malformed cursor"))?;
        let values: Vec<String> = joined.split(DELIMITER).map(String::from).collect();

        if values.len() != key_columns(kind).len() {
            return Err(invalid("cursor does not belong to this collection"));
        }
        Ok(Self(values))
    }
}

/// Where a cursor request starts
#[derive(Debug, Clone, PartialEq)]
pub enum CursorPosition {
    /// `filter[id]`: one exact resource
    Id(String),
    /// `filter[artist]` / `filter[name]`: first row at or after the name
    Name(String),
    /// A full page before the key
    Before(CursorKey),
    /// A full page after the key
    After(CursorKey),
    /// A page starting one row before the key
    Previous(CursorKey),
    /// A page starting one row after the key
    Next(CursorKey),
    First,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorRequest {
    pub size: usize,
    pub position: CursorPosition,
}

pub fn supports(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Album | ResourceKind::Label)
}

fn key_columns(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Label => &["name", "pubkey"],
        _ => &["artist", "album", "tag"],
    }
}

fn name_filter(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Label => "name",
        _ => "artist",
    }
}

impl CursorRequest {
    /// Exact filters first, then the directional parameters
    pub fn parse(kind: ResourceKind, query: &ApiQuery, size: usize) -> ApiResult<Self> {
        let name_filter = name_filter(kind);
        if let Some(unknown) = query
            .filters
            .keys()
            .find(|k| k.as_str() != "id" && k.as_str() != name_filter)
        {
            return Err(ApiError::UnknownFilter(unknown.clone()));
        }

        let position = if let Some(id) = query.filter("id") {
            CursorPosition::Id(id.to_string())
        } else if let Some(name) = query.filter(name_filter) {
            CursorPosition::Name(name.to_string())
        } else if let Some(c) = &query.page.before {
            CursorPosition::Before(CursorKey::decode(kind, "before", c)?)
        } else if let Some(c) = &query.page.after {
            CursorPosition::After(CursorKey::decode(kind, "after", c)?)
        } else if let Some(c) = &query.page.previous {
            CursorPosition::Previous(CursorKey::decode(kind, "previous", c)?)
        } else if let Some(c) = &query.page.next {
            CursorPosition::Next(CursorKey::decode(kind, "next", c)?)
        } else {
            CursorPosition::First
        };

        Ok(Self { size, position })
    }
}

async fn list(
    store: &dyn LibraryStore,
    kind: ResourceKind,
    op: ListOp,
    limit: usize,
) -> ApiResult<Vec<Row>> {
    let rows = match kind {
        ResourceKind::Label => store.list_labels(op, limit).await?,
        _ => store.list_albums(op, limit).await?,
    };
    Ok(rows)
}

async fn lookup(store: &dyn LibraryStore, kind: ResourceKind, id: &str) -> ApiResult<Vec<Row>> {
    let not_found = || ApiError::not_found(kind.type_name(), id);
    let key: i64 = id.trim().parse().map_err(|_| not_found())?;

    let row = match kind {
        ResourceKind::Label => store.get_label(key).await?,
        _ => store.get_album(key).await?,
    };
    row.map(|r| vec![r]).ok_or_else(not_found)
}

/// Navigation derived from the first and last row of a page
pub fn links(kind: ResourceKind, rows: &[Row], size: usize, query: &ApiQuery, path: &str) -> ApiResult<Links> {
    let page = |member: &str, cursor: Option<&CursorKey>| {
        let mut params = vec![
            ("profile", "cursor".to_string()),
            ("size", size.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push((member, cursor.encode()));
        }
        Link::new(query.cursor_link(path, &params))
    };

    let mut links = Links::new();
    links.insert("first".to_string(), page("", None));

    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        let first = CursorKey::from_row(kind, first)?;
        let last = CursorKey::from_row(kind, last)?;
        links.insert("prev".to_string(), page("before", Some(&first)));
        links.insert("next".to_string(), page("after", Some(&last)));
        links.insert("prevLine".to_string(), page("previous", Some(&first)));
        links.insert("nextLine".to_string(), page("next", Some(&first)));
    }

    Ok(links)
}

pub async fn fetch(
    store: &dyn LibraryStore,
    kind: ResourceKind,
    request: &CursorRequest,
    query: &ApiQuery,
    path: &str,
) -> ApiResult<Page> {
    let size = request.size;

    let rows = match &request.position {
        CursorPosition::Id(id) => lookup(store, kind, id).await?,
        CursorPosition::Name(name) => list(store, kind, ListOp::ByName(name.clone()), size).await?,
        CursorPosition::Before(key) => {
            let rows = list(store, kind, ListOp::PrevPage(key.values().to_vec()), size).await?;
            if rows.len() < size {
                // Not a full page before the cursor: that is the first page
                list(store, kind, ListOp::First, size).await?
            } else {
                rows
            }
        }
        CursorPosition::After(key) => {
            list(store, kind, ListOp::NextPage(key.values().to_vec()), size).await?
        }
        CursorPosition::Previous(key) => {
            list(store, kind, ListOp::PrevLine(key.values().to_vec()), size).await?
        }
        CursorPosition::Next(key) => {
            list(store, kind, ListOp::NextLine(key.values().to_vec()), size).await?
        }
        CursorPosition::First => list(store, kind, ListOp::First, size).await?,
    };

    debug!(kind = kind.path(), position = ?request.position, rows = rows.len(), "Served cursor page");

    let shape = match kind {
        ResourceKind::Label => RowShape::Labels,
        _ => RowShape::Albums,
    };

    Ok(Page {
        links: links(kind, &rows, size, query, path)?,
        rows,
        shape,
        window: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album_row(artist: &str, album: &str, tag: i64) -> Row {
        Row::new()
            .with("tag", tag)
            .with("artist", artist)
            .with("album", album)
    }

    #[test]
    fn test_cursor_survives_encoding() {
        let key = CursorKey::from_row(ResourceKind::Album, &album_row("Miles Davis", "Kind of Blue", 1001)).unwrap();
        assert_eq!(key.values(), ["Miles Davis", "Kind of Blue", "1001"]);

        let wire = key.encode();
        assert!(!wire.contains('='));
        assert_eq!(CursorKey::decode(ResourceKind::Album, "after", &wire).unwrap(), key);
    }

    #[test]
    fn test_foreign_or_garbage_cursor_rejected() {
        let label_key = CursorKey::new(vec!["Blue Note".into(), "3".into()]).encode();
        assert!(CursorKey::decode(ResourceKind::Album, "after", &label_key).is_err());
        assert!(CursorKey::decode(ResourceKind::Album, "after", "!!!").is_err());
    }

    #[test]
    fn test_parse_priority() {
        let after = CursorKey::new(vec!["a".into(), "b".into(), "1".into()]).encode();
        let raw = format!("page[profile]=cursor&filter[id]=7&page[after]={}", after);
        let q = ApiQuery::parse(Some(&raw)).unwrap();
        let r = CursorRequest::parse(ResourceKind::Album, &q, 10).unwrap();
        assert_eq!(r.position, CursorPosition::Id("7".into()));

        let raw = format!("page[profile]=cursor&page[before]={}&page[after]={}", after, after);
        let q = ApiQuery::parse(Some(&raw)).unwrap();
        let r = CursorRequest::parse(ResourceKind::Album, &q, 10).unwrap();
        assert!(matches!(r.position, CursorPosition::Before(_)));

        let q = ApiQuery::parse(Some("page[profile]=cursor&filter[track]=x")).unwrap();
        assert!(matches!(
            CursorRequest::parse(ResourceKind::Album, &q, 10),
            Err(ApiError::UnknownFilter(_))
        ));
    }

    #[test]
    fn test_links_from_page_edges() {
        let q = ApiQuery::parse(Some("page[profile]=cursor&page[size]=2")).unwrap();
        let rows = vec![album_row("A", "One", 1), album_row("B", "Two", 2)];
        let links = links(ResourceKind::Album, &rows, 2, &q, "/api/v2/album").unwrap();

        let first = CursorKey::from_row(ResourceKind::Album, &rows[0]).unwrap().encode();
        let last = CursorKey::from_row(ResourceKind::Album, &rows[1]).unwrap().encode();
        assert!(links["next"].href.ends_with(&format!("page[after]={}", last)));
        assert!(links["prev"].href.ends_with(&format!("page[before]={}", first)));
        assert!(links["nextLine"].href.ends_with(&format!("page[next]={}", first)));
        assert!(links["prevLine"].href.contains("page[profile]=cursor&page[size]=2"));

        let empty = super::links(ResourceKind::Album, &[], 2, &q, "/api/v2/album").unwrap();
        assert_eq!(empty.len(), 1);
    }
}
