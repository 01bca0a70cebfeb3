//! Offset pagination
//!
//! A filter name selects a store operation from a fixed table. Positional
//! operations have no count primitive, so they run twice: once unbounded for
//! the total and once with the real window. Full-text operations return
//! total and window together and always step a full page.

use super::Page;
use crate::error::{ApiError, ApiResult};
use crate::request::ApiQuery;
use crate::search::bucket_shape;
use crate::store::{BucketKind, LibraryStore, SearchIndex};
use crate::views::{ResourceKind, RowShape};
use station_common::jsonapi::{Link, Links};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRequest {
    pub offset: usize,
    pub size: usize,
}

/// Store operation behind a filter name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Positional(SearchIndex),
    FullText(BucketKind),
}

impl FilterOp {
    pub fn shape(self) -> RowShape {
        match self {
            FilterOp::Positional(SearchIndex::LabelName) => RowShape::Labels,
            FilterOp::Positional(SearchIndex::ReviewAlbum) => RowShape::Reviews,
            FilterOp::Positional(SearchIndex::PlaylistDate) => RowShape::Shows,
            FilterOp::Positional(_) => RowShape::Albums,
            FilterOp::FullText(bucket) => bucket_shape(bucket),
        }
    }
}

const ALBUM_FILTERS: &[(&str, FilterOp)] = &[
    ("artist", FilterOp::Positional(SearchIndex::Artist)),
    ("album", FilterOp::Positional(SearchIndex::Album)),
    ("track", FilterOp::Positional(SearchIndex::Track)),
    ("label.id", FilterOp::Positional(SearchIndex::LabelKey)),
    ("match(artist)", FilterOp::FullText(BucketKind::Artists)),
    ("match(artist,album)", FilterOp::FullText(BucketKind::Albums)),
    ("match(track)", FilterOp::FullText(BucketKind::Tracks)),
    ("match(coll)", FilterOp::FullText(BucketKind::Compilations)),
];

const LABEL_FILTERS: &[(&str, FilterOp)] = &[
    ("name", FilterOp::Positional(SearchIndex::LabelName)),
    ("match(name)", FilterOp::FullText(BucketKind::Labels)),
];

const REVIEW_FILTERS: &[(&str, FilterOp)] = &[
    ("album.id", FilterOp::Positional(SearchIndex::ReviewAlbum)),
    ("match(review)", FilterOp::FullText(BucketKind::Reviews)),
];

const SHOW_FILTERS: &[(&str, FilterOp)] = &[
    ("date", FilterOp::Positional(SearchIndex::PlaylistDate)),
    ("match(event)", FilterOp::FullText(BucketKind::Playlists)),
];

/// Filter table of a collection
pub fn filters(kind: ResourceKind) -> &'static [(&'static str, FilterOp)] {
    match kind {
        ResourceKind::Album => ALBUM_FILTERS,
        ResourceKind::Label => LABEL_FILTERS,
        ResourceKind::Review => REVIEW_FILTERS,
        ResourceKind::Show => SHOW_FILTERS,
    }
}

/// The request's filter and the operation it names
pub fn resolve_filter<'q>(kind: ResourceKind, query: &'q ApiQuery) -> ApiResult<(FilterOp, &'q str)> {
    let table = filters(kind);
    let mut chosen = None;

    for (name, value) in &query.filters {
        let op = table
            .iter()
            .find(|(n, _)| *n == name.as_str())
            .map(|(_, op)| *op)
            .ok_or_else(|| ApiError::UnknownFilter(name.clone()))?;
        chosen.get_or_insert((op, value.as_str()));
    }

    chosen.ok_or(ApiError::MissingFilter)
}

const ALBUM_SORTS: &[&str] = &["artist", "-artist", "album", "-album", "created", "-created"];

fn validate_sort(kind: ResourceKind, sort: Option<&str>) -> ApiResult<()> {
    match sort {
        None => Ok(()),
        Some(s) if kind == ResourceKind::Album && ALBUM_SORTS.contains(&s) => Ok(()),
        Some(s) => Err(ApiError::invalid("sort", format!("unsupported sort '{}'", s))),
    }
}

/// Offset window after serving one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Offset of the next page; back to 0 once exhausted
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
    /// Rows left after this page
    pub more: usize,
}

impl PageWindow {
    /// Step `step` rows past `offset`
    pub fn advance(offset: usize, limit: usize, total: usize, step: usize) -> Self {
        let next = offset.saturating_add(step);
        if next >= total {
            PageWindow {
                offset: 0,
                limit,
                total,
                more: 0,
            }
        } else {
            PageWindow {
                offset: next,
                limit,
                total,
                more: total - next,
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.more == 0
    }

    /// Offset reported to clients; equals `total` once exhausted
    pub fn reported_offset(&self) -> usize {
        if self.is_exhausted() {
            self.total
        } else {
            self.offset
        }
    }
}

/// `first` (always) and `next` (while unexhausted) links
pub fn links(query: &ApiQuery, path: &str, window: &PageWindow) -> Links {
    let size = window.limit.to_string();
    let mut links = Links::new();

    let first = Link::new(query.link(path, &[("offset", "0".to_string()), ("size", size.clone())]))
        .with_meta("total", window.total)
        .with_meta("more", window.more)
        .with_meta("offset", window.reported_offset());
    links.insert("first".to_string(), first);

    if !window.is_exhausted() {
        let next = query.link(path, &[("offset", window.offset.to_string()), ("size", size)]);
        links.insert("next".to_string(), Link::new(next));
    }

    links
}

pub async fn fetch(
    store: &dyn LibraryStore,
    kind: ResourceKind,
    request: &OffsetRequest,
    query: &ApiQuery,
    path: &str,
) -> ApiResult<Page> {
    let (op, value) = resolve_filter(kind, query)?;
    let sort = query.sort.as_deref();
    validate_sort(kind, sort)?;

    let (rows, window) = match op {
        FilterOp::Positional(index) => {
            let total = store.search(index, 0, None, value, sort).await?.len();
            let rows = store
                .search(index, request.offset, Some(request.size), value, sort)
                .await?;
            let window = PageWindow::advance(request.offset, request.size, total, rows.len());
            (rows, window)
        }
        FilterOp::FullText(bucket) => {
            let result = store
                .search_full_text(Some(bucket), value, request.size, request.offset)
                .await?;
            let total = result.total;
            let rows = result.take(bucket).map(|b| b.rows).unwrap_or_default();
            let window = PageWindow::advance(request.offset, request.size, total, request.size);
            (rows, window)
        }
    };

    debug!(
        kind = kind.path(),
        ?op,
        offset = request.offset,
        total = window.total,
        rows = rows.len(),
        "Served offset page"
    );

    Ok(Page {
        rows,
        shape: op.shape(),
        links: links(query, path, &window),
        window: Some(window),
    })
}
