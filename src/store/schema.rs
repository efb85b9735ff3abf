//! SQLite schema definitions for the match cache database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// One row per (period kind, period key, dimension); the entries column
/// holds the serialized overlap table for that dimension. All rows of one
/// period share computed_at and closed.
const MATCH_CACHE_TABLE: Table = Table {
    name: "match_cache",
    columns: &[
        sqlite_column!("period_kind", &SqlType::Text, non_null = true),
        sqlite_column!("period_key", &SqlType::Text, non_null = true),
        sqlite_column!("dimension", &SqlType::Text, non_null = true),
        sqlite_column!("entries", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("computed_at", &SqlType::Integer, non_null = true),
        sqlite_column!("closed", &SqlType::Integer, non_null = true),
    ],
    primary_key: &["period_kind", "period_key", "dimension"],
    indices: &[],
};

pub const MATCH_CACHE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[MATCH_CACHE_TABLE],
    migration: None,
}];
