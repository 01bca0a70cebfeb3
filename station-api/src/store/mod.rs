//! Library store collaborator interface
//!
//! The tabular store is consumed only through [`LibraryStore`]. Every method
//! is a deterministic read returning flat rows; nothing here writes, retries
//! or caches.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use station_common::Result;

/// One store row: ordered column name → value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.0.insert(column.to_string(), value.into());
    }

    /// Value of a column, treating SQL NULL as absent
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column).filter(|v| !v.is_null())
    }

    /// Column rendered as text; numbers are formatted, empty strings count as absent
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

/// Positional search indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchIndex {
    /// Albums by artist name prefix
    Artist,
    /// Albums by title prefix
    Album,
    /// Albums having a track title with this prefix
    Track,
    /// Albums published by a label key
    LabelKey,
    /// Labels by name prefix
    LabelName,
    /// Public reviews of one album tag
    ReviewAlbum,
    /// Shows aired on a date (YYYY-MM-DD)
    PlaylistDate,
}

/// Full-text result buckets, one per resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    Tags,
    Albums,
    Artists,
    Tracks,
    Compilations,
    Labels,
    Reviews,
    Playlists,
}

impl BucketKind {
    pub const ALL: [BucketKind; 8] = [
        BucketKind::Tags,
        BucketKind::Albums,
        BucketKind::Artists,
        BucketKind::Tracks,
        BucketKind::Compilations,
        BucketKind::Labels,
        BucketKind::Reviews,
        BucketKind::Playlists,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BucketKind::Tags => "tags",
            BucketKind::Albums => "albums",
            BucketKind::Artists => "artists",
            BucketKind::Tracks => "tracks",
            BucketKind::Compilations => "compilations",
            BucketKind::Labels => "labels",
            BucketKind::Reviews => "reviews",
            BucketKind::Playlists => "playlists",
        }
    }
}

/// One type-homogeneous group of full-text results, already windowed
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub kind: BucketKind,
    /// Matches in this bucket before windowing
    pub total: usize,
    pub rows: Vec<Row>,
}

/// Result of a full-text search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullText {
    pub total: usize,
    pub buckets: Vec<Bucket>,
}

impl FullText {
    pub fn take(self, kind: BucketKind) -> Option<Bucket> {
        self.buckets.into_iter().find(|b| b.kind == kind)
    }
}

/// Sort-derived cursor values, in the collection's sort-column order
pub type KeyValues = Vec<String>;

/// Library list operations addressed by sort key rather than position
#[derive(Debug, Clone, PartialEq)]
pub enum ListOp {
    /// From the beginning of the sort order
    First,
    /// Starting at the first row whose leading sort column is >= the name
    ByName(String),
    /// The `limit` rows immediately before the key, in ascending order
    PrevPage(KeyValues),
    /// The `limit` rows strictly after the key
    NextPage(KeyValues),
    /// `limit` rows starting one row before the key
    PrevLine(KeyValues),
    /// `limit` rows starting one row after the key
    NextLine(KeyValues),
}

/// Playlist event kinds reported by [`LibraryStore::get_tracks_with_observer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Spin,
    Comment,
    LogEvent,
    SetSeparator,
}

impl EventKind {
    /// Decode the store's event type column
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "spin" => Some(EventKind::Spin),
            "comment" => Some(EventKind::Comment),
            "log" | "logEvent" => Some(EventKind::LogEvent),
            "break" => Some(EventKind::SetSeparator),
            _ => None,
        }
    }
}

/// Receives playlist events in air order
pub trait PlaylistObserver {
    fn observe(&mut self, kind: EventKind, row: &Row);
}

/// Read-only library store
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Positional search; `limit: None` means an unbounded window
    async fn search(
        &self,
        index: SearchIndex,
        offset: usize,
        limit: Option<usize>,
        query: &str,
        sort: Option<&str>,
    ) -> Result<Vec<Row>>;

    /// Full-text search across one bucket kind, or every kind when `None`
    async fn search_full_text(
        &self,
        domain: Option<BucketKind>,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<FullText>;

    /// Album list in (artist, album, tag) order
    async fn list_albums(&self, op: ListOp, limit: usize) -> Result<Vec<Row>>;

    /// Label list in (name, pubkey) order
    async fn list_labels(&self, op: ListOp, limit: usize) -> Result<Vec<Row>>;

    async fn get_album(&self, tag: i64) -> Result<Option<Row>>;

    async fn get_album_tracks(&self, tag: i64) -> Result<Vec<Row>>;

    /// Artwork location for an album, when the library has any
    async fn get_artwork(&self, tag: i64) -> Result<Option<String>>;

    async fn get_label(&self, pubkey: i64) -> Result<Option<Row>>;

    /// Public reviews of an album; bodies only when asked for
    async fn get_reviews(&self, tag: i64, with_body: bool) -> Result<Vec<Row>>;

    async fn get_review(&self, id: i64) -> Result<Option<Row>>;

    async fn get_playlist(&self, id: i64) -> Result<Option<Row>>;

    /// Feed a playlist's events to `observer` in air order
    async fn get_tracks_with_observer(
        &self,
        playlist_id: i64,
        observer: &mut (dyn PlaylistObserver + Send),
    ) -> Result<()>;
}
