//! Shared fixtures for station-api integration tests
//!
//! `FixtureStore` is an in-memory `LibraryStore` over a small jazz library:
//! twelve Miles Davis albums, a few others, one collection, three labels,
//! reviews and two shows (one a rebroadcast of the other).

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use station_api::store::{
    Bucket, BucketKind, EventKind, FullText, LibraryStore, ListOp, PlaylistObserver, Row,
    SearchIndex,
};
use station_api::{build_router, AppState};
use station_common::api::{hash_api_key, KeyTable, Scope};
use station_common::config::{ApiConfig, ApiKeyConfig};
use station_common::{Error, Result};
use tower::ServiceExt;

pub const DJ_KEY: &str = "dj-key";
pub const SEARCH_KEY: &str = "search-key";

pub const MILES_TITLES: [&str; 12] = [
    "Birth of the Cool",
    "Bitches Brew",
    "Cookin'",
    "E.S.P.",
    "In a Silent Way",
    "Kind of Blue",
    "Miles Ahead",
    "Milestones",
    "Nefertiti",
    "Porgy and Bess",
    "Sketches of Spain",
    "Someday My Prince Will Come",
];

/// Tag of "Kind of Blue", the album with tracks, reviews and artwork
pub const KIND_OF_BLUE: i64 = 1006;

pub const COLLECTION_TAG: i64 = 3001;

fn album(tag: i64, artist: &str, title: &str, pubkey: i64, location: &str, bin: &str) -> Row {
    Row::new()
        .with("tag", tag)
        .with("artist", artist)
        .with("album", title)
        .with("category", "5")
        .with("medium", "C")
        .with("size", "F")
        .with("created", "2020-01-01")
        .with("updated", "2020-06-01")
        .with("location", location)
        .with("bin", bin)
        .with("pubkey", pubkey)
        .with("iscoll", "0")
}

fn track(tag: i64, seq: i64, title: &str, artist: Option<&str>, duration: &str) -> Row {
    let row = Row::new().with("tag", tag).with("seq", seq).with("track", title);
    let row = match artist {
        Some(a) => row.with("artist", a),
        None => row.with("artist", Value::Null),
    };
    row.with("duration", duration)
}

fn label(pubkey: i64, name: &str, city: &str, international: &str) -> Row {
    Row::new()
        .with("pubkey", pubkey)
        .with("name", name)
        .with("city", city)
        .with("international", international)
        .with("pcreated", "2001-01-01")
}

fn review(id: i64, tag: i64, airname: &str, created: &str, private: i64, body: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("tag", tag)
        .with("airname", airname)
        .with("created", created)
        .with("private", private)
        .with("review", body)
}

fn event(list: i64, seq: i64, kind: &str) -> Row {
    Row::new()
        .with("list", list)
        .with("seq", seq)
        .with("type", kind)
        .with("created", format!("2024-03-01 08:{:02}:00", seq * 5))
}

pub struct FixtureStore {
    albums: RwLock<Vec<Row>>,
    tracks: Vec<Row>,
    labels: Vec<Row>,
    reviews: Vec<Row>,
    playlists: Vec<Row>,
    events: Vec<Row>,
    artwork: HashMap<i64, String>,
    reads: Mutex<Vec<&'static str>>,
    failing: AtomicBool,
}

impl FixtureStore {
    pub fn seeded() -> Self {
        let mut albums: Vec<Row> = MILES_TITLES
            .iter()
            .enumerate()
            .map(|(i, title)| album(1001 + i as i64, "Miles Davis", title, 1, "L", "A1"))
            .collect();
        albums.push(album(2001, "Art Blakey", "Moanin'", 2, "G", "B12"));
        albums.push(album(2002, "Bill Evans", "Sunday at the Village Vanguard", 3, "L", "X9"));
        albums.push(album(2003, "Chet Baker", "Chet Baker Sings", 3, "L", ""));
        albums.push(
            album(COLLECTION_TAG, "Various Artists", "Jazz Classics", 2, "L", "")
                .with("iscoll", "Y"),
        );

        let tracks = vec![
            track(KIND_OF_BLUE, 1, "So What", None, "9:22"),
            track(KIND_OF_BLUE, 2, "Freddie Freeloader", None, "9:46"),
            track(KIND_OF_BLUE, 3, "Blue in Green", None, "5:37"),
            track(2001, 1, "Moanin'", None, "9:35"),
            track(COLLECTION_TAG, 1, "My Funny Valentine", Some("Chet Baker"), "2:20"),
            track(COLLECTION_TAG, 2, "Blues March", Some("Art Blakey"), "6:15"),
        ];

        let labels = vec![
            label(1, "Columbia", "New York", "F"),
            label(2, "Blue Note", "New York", "F"),
            label(3, "Riverside", "New York", "T"),
        ];

        let reviews = vec![
            review(1, KIND_OF_BLUE, "DJ Kat", "2024-02-01", 0, "A landmark modal record."),
            review(2, KIND_OF_BLUE, "Night Owl", "2024-01-15", 0, "Cool and essential."),
            review(3, KIND_OF_BLUE, "Night Owl", "2024-01-20", 1, "draft notes"),
            review(4, 2001, "DJ Kat", "2023-11-02", 0, "Hard bop at its hardest."),
        ];

        let playlists = vec![
            Row::new()
                .with("id", 10)
                .with("description", "Morning Jazz")
                .with("airname", "DJ Kat")
                .with("showdate", "2024-03-01")
                .with("showtime", "0800-1000")
                .with("origin", Value::Null),
            Row::new()
                .with("id", 11)
                .with("description", "Morning Jazz (rebroadcast)")
                .with("airname", "DJ Kat")
                .with("showdate", "2024-03-08")
                .with("showtime", "0800-1000")
                .with("origin", 10),
        ];

        let events = vec![
            event(10, 1, "spin")
                .with("tag", KIND_OF_BLUE)
                .with("artist", "Miles Davis")
                .with("album", "Kind of Blue")
                .with("track", "So What")
                .with("label", "Columbia"),
            event(10, 2, "comment").with("comment", "Pledge drive starts now"),
            event(10, 3, "break"),
            event(10, 4, "log").with("comment", "Station ID").with("code", "ID"),
            event(10, 5, "spin")
                .with("artist", "Local Band")
                .with("album", "Demo")
                .with("track", "Garage Tune"),
            event(10, 6, "mystery"),
            event(11, 1, "spin")
                .with("tag", 2001)
                .with("artist", "Art Blakey")
                .with("album", "Moanin'")
                .with("track", "Moanin'")
                .with("label", "Blue Note"),
        ];

        let mut artwork = HashMap::new();
        artwork.insert(KIND_OF_BLUE, "img/kind-of-blue".to_string());

        Self {
            albums: RwLock::new(albums),
            tracks,
            labels,
            reviews,
            playlists,
            events,
            artwork,
            reads: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Add an album, as another client of the library might meanwhile
    pub fn insert_album(&self, tag: i64, artist: &str, title: &str) {
        self.albums
            .write()
            .unwrap()
            .push(album(tag, artist, title, 1, "L", ""));
    }

    pub fn remove_album(&self, tag: i64) {
        self.albums
            .write()
            .unwrap()
            .retain(|a| a.integer("tag") != Some(tag));
    }

    /// Make every store call fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Store operations issued so far
    pub fn reads(&self) -> Vec<&'static str> {
        self.reads.lock().unwrap().clone()
    }

    pub fn clear_reads(&self) {
        self.reads.lock().unwrap().clear();
    }

    fn record(&self, op: &'static str) -> Result<()> {
        self.reads.lock().unwrap().push(op);
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(Error::Internal(format!("{} unavailable", op)));
        }
        Ok(())
    }

    fn sorted_albums(&self) -> Vec<Row> {
        let mut albums = self.albums.read().unwrap().clone();
        albums.sort_by(|a, b| album_key(a).cmp(&album_key(b)));
        albums
    }

    fn sorted_labels(&self) -> Vec<Row> {
        let mut labels = self.labels.clone();
        labels.sort_by(|a, b| label_key(a).cmp(&label_key(b)));
        labels
    }

    fn public_reviews(&self) -> Vec<Row> {
        let mut reviews: Vec<Row> = self
            .reviews
            .iter()
            .filter(|r| r.integer("private") == Some(0))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.text("created").cmp(&a.text("created")));
        reviews
    }

    fn tracks_of(&self, tag: i64) -> Vec<Row> {
        let mut tracks: Vec<Row> = self
            .tracks
            .iter()
            .filter(|t| t.integer("tag") == Some(tag))
            .cloned()
            .collect();
        tracks.sort_by_key(|t| t.integer("seq"));
        tracks
    }

    fn bucket_rows(&self, kind: BucketKind, query: &str) -> Vec<Row> {
        let needle = query.to_lowercase();
        let has = |row: &Row, column: &str| {
            row.text(column)
                .map(|v| v.to_lowercase().contains(&needle))
                .unwrap_or(false)
        };
        let is_coll = |row: &Row| row.text("iscoll").as_deref() == Some("Y");

        match kind {
            BucketKind::Tags => match query.trim().parse::<i64>() {
                Ok(tag) => self
                    .sorted_albums()
                    .into_iter()
                    .filter(|a| a.integer("tag") == Some(tag))
                    .collect(),
                Err(_) => Vec::new(),
            },
            BucketKind::Albums => self
                .sorted_albums()
                .into_iter()
                .filter(|a| has(a, "artist") || has(a, "album"))
                .collect(),
            BucketKind::Artists => self
                .sorted_albums()
                .into_iter()
                .filter(|a| has(a, "artist"))
                .collect(),
            BucketKind::Tracks => {
                let mut rows = Vec::new();
                for album in self.sorted_albums().iter().filter(|a| !is_coll(a)) {
                    let tag = album.integer("tag").unwrap_or_default();
                    for t in self.tracks_of(tag).iter().filter(|t| has(t, "track")) {
                        rows.push(joined(album, t));
                    }
                }
                rows
            }
            BucketKind::Compilations => {
                let mut rows = Vec::new();
                for album in self.sorted_albums().iter().filter(|a| is_coll(a)) {
                    let tag = album.integer("tag").unwrap_or_default();
                    for t in self
                        .tracks_of(tag)
                        .iter()
                        .filter(|t| has(t, "track") || has(t, "artist"))
                    {
                        // store layout: collection title as artist, performer as album
                        let mut row = joined(album, t);
                        row.set("artist", album.get("album").cloned().unwrap_or(Value::Null));
                        row.set("album", t.get("artist").cloned().unwrap_or(Value::Null));
                        rows.push(row);
                    }
                }
                rows
            }
            BucketKind::Labels => self
                .sorted_labels()
                .into_iter()
                .filter(|l| has(l, "name"))
                .collect(),
            BucketKind::Reviews => self
                .public_reviews()
                .into_iter()
                .filter(|r| has(r, "review"))
                .collect(),
            BucketKind::Playlists => {
                let mut rows = Vec::new();
                for show in &self.playlists {
                    let id = show.integer("id");
                    for e in self.events.iter().filter(|e| e.integer("list") == id) {
                        let is_spin = e.text("type").as_deref() == Some("spin");
                        if is_spin && (has(e, "artist") || has(e, "album") || has(e, "track")) {
                            let mut row = show.clone();
                            for column in ["type", "tag", "artist", "album", "track", "label", "created"] {
                                if let Some(v) = e.get(column) {
                                    row.set(column, v.clone());
                                }
                            }
                            rows.push(row);
                        }
                    }
                }
                rows
            }
        }
    }
}

fn joined(album: &Row, track: &Row) -> Row {
    let mut row = album.clone();
    for column in ["seq", "track", "duration"] {
        if let Some(v) = track.get(column) {
            row.set(column, v.clone());
        }
    }
    row
}

type AlbumKey = (String, String, i64);
type LabelKey = (String, i64);

fn album_key(row: &Row) -> AlbumKey {
    (
        row.text("artist").unwrap_or_default(),
        row.text("album").unwrap_or_default(),
        row.integer("tag").unwrap_or_default(),
    )
}

fn label_key(row: &Row) -> LabelKey {
    (
        row.text("name").unwrap_or_default(),
        row.integer("pubkey").unwrap_or_default(),
    )
}

fn parse_album_key(values: &[String]) -> Result<AlbumKey> {
    match values {
        [artist, album, tag] => Ok((
            artist.clone(),
            album.clone(),
            tag.parse()
                .map_err(|_| Error::InvalidInput("bad tag in cursor".into()))?,
        )),
        _ => Err(Error::InvalidInput("bad album cursor".into())),
    }
}

fn parse_label_key(values: &[String]) -> Result<LabelKey> {
    match values {
        [name, pubkey] => Ok((
            name.clone(),
            pubkey
                .parse()
                .map_err(|_| Error::InvalidInput("bad pubkey in cursor".into()))?,
        )),
        _ => Err(Error::InvalidInput("bad label cursor".into())),
    }
}

fn window(rows: Vec<Row>, offset: usize, limit: Option<usize>) -> Vec<Row> {
    rows.into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Apply a list operation to rows already in key order
fn list_by_key<K: Ord>(
    rows: Vec<Row>,
    key_of: impl Fn(&Row) -> K,
    name_of: impl Fn(&Row) -> String,
    parse: impl Fn(&[String]) -> Result<K>,
    op: ListOp,
    limit: usize,
) -> Result<Vec<Row>> {
    let after = |key: &K| -> Vec<Row> {
        rows.iter()
            .filter(|r| key_of(r).cmp(key) == Ordering::Greater)
            .take(limit)
            .cloned()
            .collect()
    };

    Ok(match op {
        ListOp::First => rows.iter().take(limit).cloned().collect(),
        ListOp::ByName(name) => rows
            .iter()
            .filter(|r| name_of(r) >= name)
            .take(limit)
            .cloned()
            .collect(),
        ListOp::NextPage(values) | ListOp::NextLine(values) => after(&parse(&values)?),
        ListOp::PrevPage(values) => {
            let key = parse(&values)?;
            let before: Vec<Row> = rows
                .iter()
                .filter(|r| key_of(r) < key)
                .cloned()
                .collect();
            let skip = before.len().saturating_sub(limit);
            before.into_iter().skip(skip).collect()
        }
        ListOp::PrevLine(values) => {
            let key = parse(&values)?;
            match rows.iter().rposition(|r| key_of(r) < key) {
                Some(start) => rows.iter().skip(start).take(limit).cloned().collect(),
                None => rows.iter().take(limit).cloned().collect(),
            }
        }
    })
}

#[async_trait]
impl LibraryStore for FixtureStore {
    async fn search(
        &self,
        index: SearchIndex,
        offset: usize,
        limit: Option<usize>,
        query: &str,
        sort: Option<&str>,
    ) -> Result<Vec<Row>> {
        self.record("search")?;
        let prefix = query.to_lowercase();
        let starts = |row: &Row, column: &str| {
            row.text(column)
                .map(|v| v.to_lowercase().starts_with(&prefix))
                .unwrap_or(false)
        };

        let mut rows: Vec<Row> = match index {
            SearchIndex::Artist => self
                .sorted_albums()
                .into_iter()
                .filter(|a| starts(a, "artist"))
                .collect(),
            SearchIndex::Album => self
                .sorted_albums()
                .into_iter()
                .filter(|a| starts(a, "album"))
                .collect(),
            SearchIndex::Track => {
                let tags: Vec<i64> = self
                    .tracks
                    .iter()
                    .filter(|t| starts(t, "track"))
                    .filter_map(|t| t.integer("tag"))
                    .collect();
                self.sorted_albums()
                    .into_iter()
                    .filter(|a| a.integer("tag").is_some_and(|t| tags.contains(&t)))
                    .collect()
            }
            SearchIndex::LabelKey => {
                let pubkey: i64 = query
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidInput("label id is not an integer".into()))?;
                self.sorted_albums()
                    .into_iter()
                    .filter(|a| a.integer("pubkey") == Some(pubkey))
                    .collect()
            }
            SearchIndex::LabelName => self
                .sorted_labels()
                .into_iter()
                .filter(|l| starts(l, "name"))
                .collect(),
            SearchIndex::ReviewAlbum => {
                let tag: i64 = query
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidInput("album id is not an integer".into()))?;
                self.public_reviews()
                    .into_iter()
                    .filter(|r| r.integer("tag") == Some(tag))
                    .collect()
            }
            SearchIndex::PlaylistDate => self
                .playlists
                .iter()
                .filter(|p| p.text("showdate").as_deref() == Some(query.trim()))
                .cloned()
                .collect(),
        };

        match sort {
            Some("-artist") => rows.sort_by(|a, b| b.text("artist").cmp(&a.text("artist"))),
            Some("album") => rows.sort_by(|a, b| a.text("album").cmp(&b.text("album"))),
            Some("-album") => rows.sort_by(|a, b| b.text("album").cmp(&a.text("album"))),
            Some("created") => rows.sort_by(|a, b| a.text("created").cmp(&b.text("created"))),
            Some("-created") => rows.sort_by(|a, b| b.text("created").cmp(&a.text("created"))),
            _ => {}
        }

        Ok(window(rows, offset, limit))
    }

    async fn search_full_text(
        &self,
        domain: Option<BucketKind>,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<FullText> {
        self.record("search_full_text")?;
        let kinds = match domain {
            Some(kind) => vec![kind],
            None => BucketKind::ALL.to_vec(),
        };

        let mut result = FullText::default();
        for kind in kinds {
            let rows = self.bucket_rows(kind, query);
            if rows.is_empty() {
                continue;
            }
            let total = rows.len();
            result.total += total;
            result.buckets.push(Bucket {
                kind,
                total,
                rows: window(rows, offset, Some(limit)),
            });
        }
        Ok(result)
    }

    async fn list_albums(&self, op: ListOp, limit: usize) -> Result<Vec<Row>> {
        self.record("list_albums")?;
        list_by_key(
            self.sorted_albums(),
            album_key,
            |r| r.text("artist").unwrap_or_default(),
            parse_album_key,
            op,
            limit,
        )
    }

    async fn list_labels(&self, op: ListOp, limit: usize) -> Result<Vec<Row>> {
        self.record("list_labels")?;
        list_by_key(
            self.sorted_labels(),
            label_key,
            |r| r.text("name").unwrap_or_default(),
            parse_label_key,
            op,
            limit,
        )
    }

    async fn get_album(&self, tag: i64) -> Result<Option<Row>> {
        self.record("get_album")?;
        Ok(self
            .albums
            .read()
            .unwrap()
            .iter()
            .find(|a| a.integer("tag") == Some(tag))
            .cloned())
    }

    async fn get_album_tracks(&self, tag: i64) -> Result<Vec<Row>> {
        self.record("get_album_tracks")?;
        Ok(self.tracks_of(tag))
    }

    async fn get_artwork(&self, tag: i64) -> Result<Option<String>> {
        self.record("get_artwork")?;
        Ok(self.artwork.get(&tag).cloned())
    }

    async fn get_label(&self, pubkey: i64) -> Result<Option<Row>> {
        self.record("get_label")?;
        Ok(self
            .labels
            .iter()
            .find(|l| l.integer("pubkey") == Some(pubkey))
            .cloned())
    }

    async fn get_reviews(&self, tag: i64, with_body: bool) -> Result<Vec<Row>> {
        self.record("get_reviews")?;
        Ok(self
            .public_reviews()
            .into_iter()
            .filter(|r| r.integer("tag") == Some(tag))
            .map(|r| {
                if with_body {
                    r
                } else {
                    r.columns()
                        .filter(|(name, _)| name.as_str() != "review")
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                }
            })
            .collect())
    }

    async fn get_review(&self, id: i64) -> Result<Option<Row>> {
        self.record("get_review")?;
        Ok(self
            .public_reviews()
            .into_iter()
            .find(|r| r.integer("id") == Some(id)))
    }

    async fn get_playlist(&self, id: i64) -> Result<Option<Row>> {
        self.record("get_playlist")?;
        Ok(self
            .playlists
            .iter()
            .find(|p| p.integer("id") == Some(id))
            .cloned())
    }

    async fn get_tracks_with_observer(
        &self,
        playlist_id: i64,
        observer: &mut (dyn PlaylistObserver + Send),
    ) -> Result<()> {
        self.record("get_tracks_with_observer")?;
        let mut events: Vec<&Row> = self
            .events
            .iter()
            .filter(|e| e.integer("list") == Some(playlist_id))
            .collect();
        events.sort_by_key(|e| e.integer("seq"));

        for event in events {
            let code = event.text("type").unwrap_or_default();
            if let Some(kind) = EventKind::from_code(&code) {
                observer.observe(kind, event);
            }
        }
        Ok(())
    }
}

/// Router over `store` with two keys: `DJ_KEY` (no scopes) and
/// `SEARCH_KEY` (search scope)
pub fn app_with(store: Arc<dyn LibraryStore>) -> Router {
    let keys = KeyTable::new(vec![
        ApiKeyConfig {
            name: "dj-console".to_string(),
            key_sha256: hash_api_key(DJ_KEY),
            scopes: vec![],
        },
        ApiKeyConfig {
            name: "indexer".to_string(),
            key_sha256: hash_api_key(SEARCH_KEY),
            scopes: vec![Scope::Search],
        },
    ]);
    build_router(AppState::new(store, ApiConfig::default(), keys))
}

pub fn fixture() -> (Arc<FixtureStore>, Router) {
    let store = Arc::new(FixtureStore::seeded());
    let app = app_with(store.clone());
    (store, app)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Value,
}

impl TestResponse {
    /// Primary data as a list
    pub fn data(&self) -> &Vec<Value> {
        self.body["data"].as_array().expect("data is not an array")
    }

    pub fn ids(&self) -> Vec<String> {
        self.data()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn included(&self, kind: &str) -> Vec<&Value> {
        self.body["included"]
            .as_array()
            .map(|list| list.iter().filter(|r| r["type"] == kind).collect())
            .unwrap_or_default()
    }
}

/// GET `uri` with an optional API key
pub async fn get(app: &Router, uri: &str, key: Option<&str>) -> TestResponse {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(key) = key {
        request = request.header("X-APIKEY", key);
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        content_type,
        body,
    }
}

/// Follow `links.next` from `uri` until it disappears, collecting ids
pub async fn traverse_offset(app: &Router, uri: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut next = Some(uri.to_string());
    let mut guard = 0;

    while let Some(uri) = next.take() {
        let page = get(app, &uri, None).await;
        assert_eq!(page.status, StatusCode::OK, "{}", page.body);
        ids.extend(page.ids());
        next = page.body["links"]["next"].as_str().map(String::from);

        guard += 1;
        assert!(guard < 1000, "pagination did not terminate");
    }

    ids
}
