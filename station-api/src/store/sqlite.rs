//! SQLite rendition of the library store
//!
//! Opened read-only in production. `init_schema` exists for tests and for
//! bootstrapping an empty library file.

use super::{
    Bucket, BucketKind, EventKind, FullText, LibraryStore, ListOp, PlaylistObserver, Row,
    SearchIndex,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Arguments, Column, Row as _, SqlitePool, ValueRef};
use station_common::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

const ALBUM_COLUMNS: &str = "a.tag, a.artist, a.album, a.category, a.medium, a.size, \
     a.created, a.updated, a.location, a.bin, a.pubkey, a.iscoll, p.name AS label";

const ALBUM_FROM: &str = "albumvol a LEFT JOIN publishers p ON p.pubkey = a.pubkey";

const ALBUM_ORDER: &str = "a.artist, a.album, a.tag";

const LABEL_COLUMNS: &str = "pubkey, name, attention, address, city, state, zip, phone, \
     fax, email, url, international, pcreated, modified";

const REVIEW_COLUMNS: &str = "r.id, r.tag, r.airname, r.created";

const PLAYLIST_COLUMNS: &str = "l.id, l.description, l.airname, l.showdate, l.showtime, l.origin";

/// Read-only library store on SQLite
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing library database in read-only mode
    pub async fn connect_readonly(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::Config(format!(
                "Library database not found: {}",
                db_path.display()
            )));
        }

        // mode=ro: the service never writes to the library
        let db_url = format!("sqlite://{}?mode=ro", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&db_url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database (each connection would see its own)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the library tables if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch(&self, sql: &str, args: SqliteArguments<'static>) -> Result<Vec<Row>> {
        debug!(sql, "library query");
        let rows = sqlx::query_with(sql, args).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn count(&self, sql: &str, args: SqliteArguments<'static>) -> Result<usize> {
        let wrapped = format!("SELECT COUNT(*) FROM ({})", sql);
        let total: i64 = sqlx::query_scalar_with(&wrapped, args)
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as usize)
    }

    async fn bucket(
        &self,
        kind: BucketKind,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Bucket> {
        let pattern = format!("%{}%", query);
        let (select, order, binds): (String, &str, usize) = match kind {
            BucketKind::Tags => {
                let Ok(tag) = query.trim().parse::<i64>() else {
                    return Ok(Bucket {
                        kind,
                        total: 0,
                        rows: Vec::new(),
                    });
                };
                let sql = format!(
                    "SELECT {} FROM {} WHERE a.tag = ?",
                    ALBUM_COLUMNS, ALBUM_FROM
                );
                let rows = self.fetch(&sql, args_i64(&[tag])?).await?;
                return Ok(Bucket {
                    kind,
                    total: rows.len(),
                    rows,
                });
            }
            BucketKind::Albums => (
                format!(
                    "SELECT {} FROM {} WHERE a.artist LIKE ? OR a.album LIKE ?",
                    ALBUM_COLUMNS, ALBUM_FROM
                ),
                ALBUM_ORDER,
                2,
            ),
            BucketKind::Artists => (
                format!(
                    "SELECT {} FROM {} WHERE a.artist LIKE ?",
                    ALBUM_COLUMNS, ALBUM_FROM
                ),
                ALBUM_ORDER,
                1,
            ),
            BucketKind::Tracks => (
                format!(
                    "SELECT {}, t.seq, t.track, t.duration FROM tracknames t \
                     JOIN albumvol a ON a.tag = t.tag \
                     LEFT JOIN publishers p ON p.pubkey = a.pubkey \
                     WHERE a.iscoll NOT IN ('1', 'Y', 'y', 'T', 't') AND t.track LIKE ?",
                    ALBUM_COLUMNS
                ),
                "a.artist, a.album, a.tag, t.seq",
                1,
            ),
            // Collection rows put the collection title where the artist is
            // expected and the performer where the album is.
            BucketKind::Compilations => (
                "SELECT a.tag, a.album AS artist, t.artist AS album, a.category, a.medium, \
                 a.size, a.created, a.updated, a.location, a.bin, a.pubkey, a.iscoll, \
                 p.name AS label, t.seq, t.track, t.duration FROM tracknames t \
                 JOIN albumvol a ON a.tag = t.tag \
                 LEFT JOIN publishers p ON p.pubkey = a.pubkey \
                 WHERE a.iscoll IN ('1', 'Y', 'y', 'T', 't') \
                 AND (t.track LIKE ? OR t.artist LIKE ?)"
                    .to_string(),
                "a.album, a.tag, t.seq",
                2,
            ),
            BucketKind::Labels => (
                format!(
                    "SELECT {} FROM publishers WHERE name LIKE ?",
                    LABEL_COLUMNS
                ),
                "name, pubkey",
                1,
            ),
            BucketKind::Reviews => (
                format!(
                    "SELECT {}, r.review FROM reviews r WHERE r.private = 0 AND r.review LIKE ?",
                    REVIEW_COLUMNS
                ),
                "r.created DESC, r.id",
                1,
            ),
            BucketKind::Playlists => (
                format!(
                    "SELECT {}, e.type, e.tag, e.artist, e.album, e.track, e.label, e.created \
                     FROM plays e JOIN lists l ON l.id = e.list \
                     WHERE e.type = 'spin' AND (e.artist LIKE ? OR e.album LIKE ? OR e.track LIKE ?)",
                    PLAYLIST_COLUMNS
                ),
                "l.showdate DESC, l.id, e.seq",
                3,
            ),
        };

        let total = self.count(&select, args_repeat(&pattern, binds)?).await?;
        let mut args = args_repeat(&pattern, binds)?;
        push_window(&mut args, Some(limit), offset)?;
        let sql = format!("{} ORDER BY {} LIMIT ? OFFSET ?", select, order);
        let rows = self.fetch(&sql, args).await?;

        Ok(Bucket { kind, total, rows })
    }

    async fn list(&self, keyed: &KeyedList, op: ListOp, limit: usize) -> Result<Vec<Row>> {
        let base = format!("SELECT {} FROM {}", keyed.columns, keyed.from);
        let key_tuple = format!("({})", keyed.key.join(", "));
        let placeholders = format!(
            "({})",
            vec!["?"; keyed.key.len()].join(", ")
        );
        let ascending = keyed.key.join(", ");
        let descending = keyed
            .key
            .iter()
            .map(|c| format!("{} DESC", c))
            .collect::<Vec<_>>()
            .join(", ");

        match op {
            ListOp::First => {
                let sql = format!("{} ORDER BY {} LIMIT ?", base, ascending);
                self.fetch(&sql, args_i64(&[limit as i64])?).await
            }
            ListOp::ByName(name) => {
                let sql = format!(
                    "{} WHERE {} >= ? ORDER BY {} LIMIT ?",
                    base, keyed.key[0], ascending
                );
                let mut args = SqliteArguments::default();
                add(&mut args, name)?;
                add(&mut args, limit as i64)?;
                self.fetch(&sql, args).await
            }
            ListOp::NextPage(key) | ListOp::NextLine(key) => {
                let sql = format!(
                    "{} WHERE {} > {} ORDER BY {} LIMIT ?",
                    base, key_tuple, placeholders, ascending
                );
                let mut args = keyed.key_args(&key)?;
                add(&mut args, limit as i64)?;
                self.fetch(&sql, args).await
            }
            ListOp::PrevPage(key) => {
                let sql = format!(
                    "{} WHERE {} < {} ORDER BY {} LIMIT ?",
                    base, key_tuple, placeholders, descending
                );
                let mut args = keyed.key_args(&key)?;
                add(&mut args, limit as i64)?;
                let mut rows = self.fetch(&sql, args).await?;
                rows.reverse();
                Ok(rows)
            }
            ListOp::PrevLine(key) => {
                // Find the row just before the key, then page forward from it
                let sql = format!(
                    "{} WHERE {} < {} ORDER BY {} LIMIT 1",
                    base, key_tuple, placeholders, descending
                );
                let previous = self.fetch(&sql, keyed.key_args(&key)?).await?;
                let Some(previous) = previous.first() else {
                    let sql = format!("{} ORDER BY {} LIMIT ?", base, ascending);
                    return self.fetch(&sql, args_i64(&[limit as i64])?).await;
                };
                let anchor: Vec<String> = keyed
                    .row_key
                    .iter()
                    .map(|c| previous.text(c).unwrap_or_default())
                    .collect();
                let sql = format!(
                    "{} WHERE {} >= {} ORDER BY {} LIMIT ?",
                    base, key_tuple, placeholders, ascending
                );
                let mut args = keyed.key_args(&anchor)?;
                add(&mut args, limit as i64)?;
                self.fetch(&sql, args).await
            }
        }
    }
}

/// Column layout of a cursor-addressed list
struct KeyedList {
    columns: &'static str,
    from: &'static str,
    /// Sort key as SQL expressions
    key: &'static [&'static str],
    /// Sort key as row column names
    row_key: &'static [&'static str],
    /// Positions within the key holding integers
    integer_positions: &'static [usize],
}

impl KeyedList {
    fn key_args(&self, key: &[String]) -> Result<SqliteArguments<'static>> {
        if key.len() != self.key.len() {
            return Err(Error::InvalidInput(format!(
                "cursor has {} values, expected {}",
                key.len(),
                self.key.len()
            )));
        }
        let mut args = SqliteArguments::default();
        for (i, value) in key.iter().enumerate() {
            if self.integer_positions.contains(&i) {
                let n: i64 = value.parse().map_err(|_| {
                    Error::InvalidInput(format!("cursor value '{}' is not an integer", value))
                })?;
                add(&mut args, n)?;
            } else {
                add(&mut args, value.clone())?;
            }
        }
        Ok(args)
    }
}

const ALBUM_LIST: KeyedList = KeyedList {
    columns: ALBUM_COLUMNS,
    from: ALBUM_FROM,
    key: &["a.artist", "a.album", "a.tag"],
    row_key: &["artist", "album", "tag"],
    integer_positions: &[2],
};

const LABEL_LIST: KeyedList = KeyedList {
    columns: LABEL_COLUMNS,
    from: "publishers",
    key: &["name", "pubkey"],
    row_key: &["name", "pubkey"],
    integer_positions: &[1],
};

fn add<'q, T>(args: &mut SqliteArguments<'q>, value: T) -> Result<()>
where
    T: 'q + sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    args.add(value)
        .map_err(|e| Error::Internal(format!("bind failed: {}", e)))
}

fn args_i64(values: &[i64]) -> Result<SqliteArguments<'static>> {
    let mut args = SqliteArguments::default();
    for v in values {
        add(&mut args, *v)?;
    }
    Ok(args)
}

fn args_repeat(value: &str, times: usize) -> Result<SqliteArguments<'static>> {
    let mut args = SqliteArguments::default();
    for _ in 0..times {
        add(&mut args, value.to_string())?;
    }
    Ok(args)
}

/// Append LIMIT/OFFSET binds; SQLite treats a negative limit as unbounded
fn push_window(args: &mut SqliteArguments<'static>, limit: Option<usize>, offset: usize) -> Result<()> {
    add(args, limit.map(|l| l as i64).unwrap_or(-1))?;
    add(args, offset as i64)
}

fn album_order(sort: Option<&str>) -> Result<&'static str> {
    match sort {
        None => Ok(ALBUM_ORDER),
        Some("artist") => Ok("a.artist, a.album, a.tag"),
        Some("-artist") => Ok("a.artist DESC, a.album, a.tag"),
        Some("album") => Ok("a.album, a.artist, a.tag"),
        Some("-album") => Ok("a.album DESC, a.artist, a.tag"),
        Some("created") => Ok("a.created, a.tag"),
        Some("-created") => Ok("a.created DESC, a.tag DESC"),
        Some(other) => Err(Error::InvalidInput(format!("unsupported sort: {}", other))),
    }
}

/// Convert a SQLite row into a column → JSON map
fn to_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = match row.try_get_raw(i) {
                Ok(raw) if raw.is_null() => Value::Null,
                Ok(_) => row
                    .try_get::<i64, _>(i)
                    .map(|v| json!(v))
                    .or_else(|_| row.try_get::<f64, _>(i).map(|v| json!(v)))
                    .or_else(|_| row.try_get::<String, _>(i).map(Value::String))
                    .unwrap_or(Value::Null),
                Err(_) => Value::Null,
            };
            (col.name().to_string(), value)
        })
        .collect()
}

#[async_trait]
impl LibraryStore for SqliteStore {
    async fn search(
        &self,
        index: SearchIndex,
        offset: usize,
        limit: Option<usize>,
        query: &str,
        sort: Option<&str>,
    ) -> Result<Vec<Row>> {
        let prefix = format!("{}%", query);
        let mut args = SqliteArguments::default();

        let sql = match index {
            SearchIndex::Artist | SearchIndex::Album | SearchIndex::Track => {
                let filter = match index {
                    SearchIndex::Artist => "a.artist LIKE ?",
                    SearchIndex::Album => "a.album LIKE ?",
                    _ => "a.tag IN (SELECT tag FROM tracknames WHERE track LIKE ?)",
                };
                add(&mut args, prefix)?;
                format!(
                    "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
                    ALBUM_COLUMNS,
                    ALBUM_FROM,
                    filter,
                    album_order(sort)?
                )
            }
            SearchIndex::LabelKey => {
                let pubkey: i64 = query.trim().parse().map_err(|_| {
                    Error::InvalidInput(format!("label id '{}' is not an integer", query))
                })?;
                add(&mut args, pubkey)?;
                format!(
                    "SELECT {} FROM {} WHERE a.pubkey = ? ORDER BY {} LIMIT ? OFFSET ?",
                    ALBUM_COLUMNS,
                    ALBUM_FROM,
                    album_order(sort)?
                )
            }
            SearchIndex::LabelName => {
                add(&mut args, prefix)?;
                format!(
                    "SELECT {} FROM publishers WHERE name LIKE ? \
                     ORDER BY name, pubkey LIMIT ? OFFSET ?",
                    LABEL_COLUMNS
                )
            }
            SearchIndex::ReviewAlbum => {
                let tag: i64 = query.trim().parse().map_err(|_| {
                    Error::InvalidInput(format!("album id '{}' is not an integer", query))
                })?;
                add(&mut args, tag)?;
                format!(
                    "SELECT {}, r.review FROM reviews r WHERE r.private = 0 AND r.tag = ? \
                     ORDER BY r.created DESC, r.id LIMIT ? OFFSET ?",
                    REVIEW_COLUMNS
                )
            }
            SearchIndex::PlaylistDate => {
                add(&mut args, query.trim().to_string())?;
                format!(
                    "SELECT {} FROM lists l WHERE l.showdate = ? \
                     ORDER BY l.showtime, l.id LIMIT ? OFFSET ?",
                    PLAYLIST_COLUMNS
                )
            }
        };

        push_window(&mut args, limit, offset)?;
        self.fetch(&sql, args).await
    }

    async fn search_full_text(
        &self,
        domain: Option<BucketKind>,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<FullText> {
        let kinds: Vec<BucketKind> = match domain {
            Some(kind) => vec![kind],
            None => BucketKind::ALL.to_vec(),
        };

        let mut result = FullText::default();
        for kind in kinds {
            let bucket = self.bucket(kind, query, limit, offset).await?;
            if bucket.total > 0 {
                result.total += bucket.total;
                result.buckets.push(bucket);
            }
        }
        Ok(result)
    }

    async fn list_albums(&self, op: ListOp, limit: usize) -> Result<Vec<Row>> {
        self.list(&ALBUM_LIST, op, limit).await
    }

    async fn list_labels(&self, op: ListOp, limit: usize) -> Result<Vec<Row>> {
        self.list(&LABEL_LIST, op, limit).await
    }

    async fn get_album(&self, tag: i64) -> Result<Option<Row>> {
        let sql = format!("SELECT {} FROM {} WHERE a.tag = ?", ALBUM_COLUMNS, ALBUM_FROM);
        Ok(self.fetch(&sql, args_i64(&[tag])?).await?.into_iter().next())
    }

    async fn get_album_tracks(&self, tag: i64) -> Result<Vec<Row>> {
        self.fetch(
            "SELECT tag, seq, track, artist, duration, url FROM tracknames \
             WHERE tag = ? ORDER BY seq",
            args_i64(&[tag])?,
        )
        .await
    }

    async fn get_artwork(&self, tag: i64) -> Result<Option<String>> {
        let rows = self
            .fetch(
                "SELECT image_uuid FROM albumart WHERE tag = ?",
                args_i64(&[tag])?,
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|r| r.text("image_uuid"))
            .map(|uuid| format!("img/{}", uuid)))
    }

    async fn get_label(&self, pubkey: i64) -> Result<Option<Row>> {
        let sql = format!("SELECT {} FROM publishers WHERE pubkey = ?", LABEL_COLUMNS);
        Ok(self.fetch(&sql, args_i64(&[pubkey])?).await?.into_iter().next())
    }

    async fn get_reviews(&self, tag: i64, with_body: bool) -> Result<Vec<Row>> {
        let body = if with_body { ", r.review" } else { "" };
        let sql = format!(
            "SELECT {}{} FROM reviews r WHERE r.private = 0 AND r.tag = ? \
             ORDER BY r.created DESC, r.id",
            REVIEW_COLUMNS, body
        );
        self.fetch(&sql, args_i64(&[tag])?).await
    }

    async fn get_review(&self, id: i64) -> Result<Option<Row>> {
        let sql = format!(
            "SELECT {}, r.review FROM reviews r WHERE r.private = 0 AND r.id = ?",
            REVIEW_COLUMNS
        );
        Ok(self.fetch(&sql, args_i64(&[id])?).await?.into_iter().next())
    }

    async fn get_playlist(&self, id: i64) -> Result<Option<Row>> {
        let sql = format!("SELECT {} FROM lists l WHERE l.id = ?", PLAYLIST_COLUMNS);
        Ok(self.fetch(&sql, args_i64(&[id])?).await?.into_iter().next())
    }

    async fn get_tracks_with_observer(
        &self,
        playlist_id: i64,
        observer: &mut (dyn PlaylistObserver + Send),
    ) -> Result<()> {
        let rows = self
            .fetch(
                "SELECT id, type, tag, artist, album, track, label, comment, code, created \
                 FROM plays WHERE list = ? ORDER BY seq, id",
                args_i64(&[playlist_id])?,
            )
            .await?;

        for row in &rows {
            let code = row.text("type").unwrap_or_default();
            match EventKind::from_code(&code) {
                Some(kind) => observer.observe(kind, row),
                None => warn!(playlist_id, code, "skipping playlist event of unknown type"),
            }
        }
        Ok(())
    }
}

/// Library schema
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS publishers (
        pubkey INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        attention TEXT,
        address TEXT,
        city TEXT,
        state TEXT,
        zip TEXT,
        phone TEXT,
        fax TEXT,
        email TEXT,
        url TEXT,
        international TEXT NOT NULL DEFAULT 'F',
        pcreated TEXT,
        modified TEXT
    )",
    "CREATE TABLE IF NOT EXISTS albumvol (
        tag INTEGER PRIMARY KEY,
        artist TEXT NOT NULL,
        album TEXT NOT NULL,
        category TEXT,
        medium TEXT,
        size TEXT,
        created TEXT,
        updated TEXT,
        location TEXT,
        bin TEXT,
        pubkey INTEGER REFERENCES publishers(pubkey),
        iscoll TEXT NOT NULL DEFAULT '0'
    )",
    "CREATE TABLE IF NOT EXISTS tracknames (
        tag INTEGER NOT NULL REFERENCES albumvol(tag),
        seq INTEGER NOT NULL,
        track TEXT NOT NULL,
        artist TEXT,
        duration TEXT,
        url TEXT,
        PRIMARY KEY (tag, seq)
    )",
    "CREATE TABLE IF NOT EXISTS albumart (
        tag INTEGER PRIMARY KEY REFERENCES albumvol(tag),
        image_uuid TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY,
        tag INTEGER NOT NULL REFERENCES albumvol(tag),
        airname TEXT,
        created TEXT,
        private INTEGER NOT NULL DEFAULT 0,
        review TEXT
    )",
    "CREATE TABLE IF NOT EXISTS lists (
        id INTEGER PRIMARY KEY,
        description TEXT,
        airname TEXT,
        showdate TEXT,
        showtime TEXT,
        origin INTEGER REFERENCES lists(id)
    )",
    "CREATE TABLE IF NOT EXISTS plays (
        id INTEGER PRIMARY KEY,
        list INTEGER NOT NULL REFERENCES lists(id),
        seq INTEGER NOT NULL DEFAULT 0,
        type TEXT NOT NULL DEFAULT 'spin',
        tag INTEGER,
        artist TEXT,
        album TEXT,
        track TEXT,
        label TEXT,
        comment TEXT,
        code TEXT,
        created TEXT
    )",
    "CREATE INDEX IF NOT EXISTS albumvol_sort ON albumvol (artist, album, tag)",
    "CREATE INDEX IF NOT EXISTS publishers_sort ON publishers (name, pubkey)",
    "CREATE INDEX IF NOT EXISTS plays_list ON plays (list, seq)",
];
