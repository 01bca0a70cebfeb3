//! Row aggregation
//!
//! Joined queries return a parent once per child (one album row per track,
//! one show row per event). [`aggregate`] folds such a sequence back into
//! parents with ordered children. It only regroups rows; rendering parents
//! into resources happens afterwards in the views.

use crate::store::Row;
use crate::views::truthy;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Column layout of a joined row sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Album rows repeated per track, keyed by `tag`
    Tracks,
    /// Show rows repeated per event, keyed by `id`
    Events,
}

const TRACK_COLUMNS: &[&str] = &["seq", "track", "duration"];
const EVENT_COLUMNS: &[&str] = &["type", "tag", "artist", "album", "track", "label", "created"];

impl Layout {
    fn key_column(self) -> &'static str {
        match self {
            Layout::Tracks => "tag",
            Layout::Events => "id",
        }
    }

    fn child_columns(self) -> &'static [&'static str] {
        match self {
            Layout::Tracks => TRACK_COLUMNS,
            Layout::Events => EVENT_COLUMNS,
        }
    }
}

/// One parent and the children that followed it
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedParent {
    pub key: String,
    /// Parent columns only, in the parent's own layout
    pub parent: Row,
    pub children: Vec<Row>,
}

/// Group rows into parents, preserving first-seen order
///
/// Rows without a parent key are logged and skipped.
pub fn aggregate(rows: &[Row], layout: Layout) -> Vec<AggregatedParent> {
    let key_column = layout.key_column();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut parents: Vec<AggregatedParent> = Vec::new();

    for (position, row) in rows.iter().enumerate() {
        let Some(key) = row.text(key_column) else {
            warn!(
                position,
                column = key_column,
                "Skipping row without parent key"
            );
            continue;
        };

        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                parents.push(AggregatedParent {
                    key: key.clone(),
                    parent: parent_row(row, layout),
                    children: Vec::new(),
                });
                index.insert(key, parents.len() - 1);
                parents.len() - 1
            }
        };

        parents[slot].children.push(child_row(row, layout));
    }

    parents
}

fn is_collection(row: &Row, layout: Layout) -> bool {
    layout == Layout::Tracks && truthy(row, "iscoll")
}

/// Parent columns, with collection title and performer put back in place
fn parent_row(row: &Row, layout: Layout) -> Row {
    let source = if is_collection(row, layout) {
        swapped(row)
    } else {
        row.clone()
    };
    let children = layout.child_columns();

    source
        .columns()
        .filter(|(name, _)| {
            // the key column stays on the parent even when children carry it
            name.as_str() == layout.key_column() || !children.contains(&name.as_str())
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Child columns, read from the row as the store laid it out
fn child_row(row: &Row, layout: Layout) -> Row {
    let mut child: Row = layout
        .child_columns()
        .iter()
        .filter_map(|&name| row.get(name).map(|v| (name, v.clone())))
        .collect();

    // The performer of a collection track sits in the album column
    if is_collection(row, layout) {
        if let Some(performer) = row.get("album") {
            child.set("artist", performer.clone());
        }
    }

    child
}

/// Copy of a collection row with artist and album exchanged
fn swapped(row: &Row) -> Row {
    let artist = row.get("artist").cloned().unwrap_or(Value::Null);
    let album = row.get("album").cloned().unwrap_or(Value::Null);
    let mut out = row.clone();
    out.set("artist", album);
    out.set("album", artist);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_row(tag: Option<i64>, seq: i64) -> Row {
        let row = Row::new();
        let row = match tag {
            Some(tag) => row.with("tag", tag),
            None => row.with("tag", Value::Null),
        };
        row.with("artist", "Miles Davis")
            .with("album", "Kind of Blue")
            .with("iscoll", "0")
            .with("seq", seq)
            .with("track", format!("Track {}", seq))
            .with("duration", "5:00")
    }

    #[test]
    fn test_contiguous_rows_group_in_order() {
        let mut rows: Vec<Row> = (1..=5).map(|s| track_row(Some(2), s)).collect();
        rows.extend((1..=3).map(|s| track_row(Some(1), s)));

        let parents = aggregate(&rows, Layout::Tracks);
        assert_eq!(parents.len(), 2);
        // first-seen order, not key order
        assert_eq!(parents[0].key, "2");
        assert_eq!(parents[0].children.len(), 5);
        assert_eq!(parents[1].key, "1");
        assert_eq!(parents[1].children.len(), 3);

        assert_eq!(parents[0].children[4].integer("seq"), Some(5));
        assert_eq!(parents[0].parent.get("seq"), None);
        assert_eq!(parents[0].parent.text("artist").as_deref(), Some("Miles Davis"));
    }

    #[test]
    fn test_null_key_row_dropped() {
        let rows = vec![
            track_row(Some(1), 1),
            track_row(None, 99),
            track_row(Some(1), 2),
        ];

        let parents = aggregate(&rows, Layout::Tracks);
        assert_eq!(parents.len(), 1);
        let seqs: Vec<i64> = parents[0]
            .children
            .iter()
            .filter_map(|c| c.integer("seq"))
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_collection_columns_swapped_for_parent_only() {
        // Store layout: collection title in artist, performer in album
        let row = Row::new()
            .with("tag", 500)
            .with("artist", "Jazz Classics")
            .with("album", "Chet Baker")
            .with("iscoll", "Y")
            .with("seq", 1)
            .with("track", "My Funny Valentine")
            .with("duration", "2:20");

        let parents = aggregate(std::slice::from_ref(&row), Layout::Tracks);
        let parent = &parents[0].parent;
        assert_eq!(parent.text("album").as_deref(), Some("Jazz Classics"));
        assert_eq!(parent.text("artist").as_deref(), Some("Chet Baker"));

        let child = &parents[0].children[0];
        assert_eq!(child.text("artist").as_deref(), Some("Chet Baker"));
        assert_eq!(child.text("track").as_deref(), Some("My Funny Valentine"));

        // the source row is untouched
        assert_eq!(row.text("artist").as_deref(), Some("Jazz Classics"));
    }

    #[test]
    fn test_event_rows_keep_parent_columns() {
        let event = |id: i64, seq: i64| {
            Row::new()
                .with("id", id)
                .with("description", "Morning Jazz")
                .with("showdate", "2024-03-01")
                .with("type", "spin")
                .with("tag", 1000 + seq)
                .with("artist", "Art Blakey")
                .with("track", format!("Cut {}", seq))
        };

        let rows = vec![event(7, 1), event(7, 2), event(8, 1)];
        let parents = aggregate(&rows, Layout::Events);
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].children.len(), 2);
        assert_eq!(parents[0].parent.text("description").as_deref(), Some("Morning Jazz"));
        assert_eq!(parents[0].parent.get("artist"), None);
        assert_eq!(parents[0].children[1].integer("tag"), Some(1002));
    }
}
