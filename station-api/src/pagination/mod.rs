//! Pagination
//!
//! Collections page one of two ways, chosen by `page[profile]`:
//!
//! - `offset` (default): numeric windows over a filtered result
//! - `cursor`: opaque sort-derived keys, stable while rows are added or
//!   removed elsewhere in the collection
//!
//! A request is parsed once into [`PageRequest`] and dispatched through
//! [`fetch_page`]; both strategies answer with the same [`Page`] shape.

pub mod cursor;
pub mod offset;

pub use cursor::{CursorKey, CursorPosition, CursorRequest};
pub use offset::{FilterOp, OffsetRequest, PageWindow};

use crate::error::{ApiError, ApiResult};
use crate::request::ApiQuery;
use crate::store::{LibraryStore, Row};
use crate::views::{ResourceKind, RowShape};
use station_common::config::ApiConfig;
use station_common::jsonapi::Links;

/// Pagination request, parsed once from the query string
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    Offset(OffsetRequest),
    Cursor(CursorRequest),
}

impl PageRequest {
    pub fn parse(kind: ResourceKind, query: &ApiQuery, settings: &ApiConfig) -> ApiResult<Self> {
        let size = query.page_size(settings)?;

        match query.page.profile.as_deref().unwrap_or("offset") {
            "offset" => Ok(PageRequest::Offset(OffsetRequest {
                offset: query.offset()?,
                size,
            })),
            "cursor" if cursor::supports(kind) => {
                Ok(PageRequest::Cursor(CursorRequest::parse(kind, query, size)?))
            }
            "cursor" => Err(ApiError::UnsupportedProfile(format!(
                "cursor is not available for {}",
                kind.path()
            ))),
            other => Err(ApiError::UnsupportedProfile(other.to_string())),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            PageRequest::Offset(r) => r.size,
            PageRequest::Cursor(r) => r.size,
        }
    }
}

/// One page of rows plus its navigation
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Row>,
    pub shape: RowShape,
    pub links: Links,
    /// Offset windows only
    pub window: Option<PageWindow>,
}

/// Fetch one page with whichever strategy the request chose
pub async fn fetch_page(
    store: &dyn LibraryStore,
    kind: ResourceKind,
    request: &PageRequest,
    query: &ApiQuery,
    base_path: &str,
) -> ApiResult<Page> {
    let path = format!("{}/{}", base_path, kind.path());
    match request {
        PageRequest::Offset(r) => offset::fetch(store, kind, r, query, &path).await,
        PageRequest::Cursor(r) => cursor::fetch(store, kind, r, query, &path).await,
    }
}
