//! SQLite schema definitions for the enrichment database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// Genre tags per artist, cached indefinitely (genres rarely change).
const ARTIST_TAGS_TABLE: Table = Table {
    name: "artist_tags",
    columns: &[
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("tags", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("fetched_at", &SqlType::Integer, non_null = true),
    ],
    primary_key: &["artist"],
    indices: &[],
};

/// Record label per (artist, album). NULL label is an explicit
/// not-found marker.
const ALBUM_LABELS_TABLE: Table = Table {
    name: "album_labels",
    columns: &[
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("album", &SqlType::Text, non_null = true),
        sqlite_column!("label", &SqlType::Text),
        sqlite_column!("fetched_at", &SqlType::Integer, non_null = true),
    ],
    primary_key: &["artist", "album"],
    indices: &[],
};

pub const ENRICHMENT_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[ARTIST_TAGS_TABLE, ALBUM_LABELS_TABLE],
    migration: None,
}];
