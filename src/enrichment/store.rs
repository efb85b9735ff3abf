//! SQLite-backed enrichment store implementation.

use super::models::{AlbumLabel, ArtistTags, EnrichmentStats};
use super::schema::ENRICHMENT_VERSIONED_SCHEMAS;
use super::trait_def::EnrichmentStore;
use crate::sqlite_persistence::open_database;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// SQLite-backed enrichment store.
#[derive(Clone)]
pub struct SqliteEnrichmentStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteEnrichmentStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let (read_conn, write_conn) =
            open_database(db_path, ENRICHMENT_VERSIONED_SCHEMAS, "enrichment")?;

        let stats = Self::count_rows(&read_conn)?;
        info!(
            "Enrichment store ready: {} artists tagged, {} albums labelled",
            stats.artists_tagged, stats.albums_labelled
        );

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    fn count_rows(conn: &Connection) -> Result<EnrichmentStats> {
        let artists_tagged: usize =
            conn.query_row("SELECT COUNT(*) FROM artist_tags", [], |r| r.get(0))?;
        let albums_labelled: usize =
            conn.query_row("SELECT COUNT(*) FROM album_labels", [], |r| r.get(0))?;
        Ok(EnrichmentStats {
            artists_tagged,
            albums_labelled,
        })
    }
}

fn parse_tags_json(artist: &str, json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!("Malformed tags JSON for {} in enrichment db: {}", artist, e);
        Vec::new()
    })
}

impl EnrichmentStore for SqliteEnrichmentStore {
    fn get_artist_tags(&self, artist: &str) -> Result<Option<ArtistTags>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT artist, tags, fetched_at FROM artist_tags WHERE artist = ?1",
        )?;
        let row = stmt
            .query_row(params![artist], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .optional()?;
        Ok(row.map(|(artist, tags_json, fetched_at)| ArtistTags {
            tags: parse_tags_json(&artist, &tags_json),
            artist,
            fetched_at,
        }))
    }

    fn upsert_artist_tags(&self, tags: &ArtistTags) -> Result<()> {
        let tags_json = serde_json::to_string(&tags.tags)?;
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO artist_tags (artist, tags, fetched_at)
             VALUES (?1, ?2, ?3)",
            params![tags.artist, tags_json, tags.fetched_at],
        )?;
        Ok(())
    }

    fn get_album_label(&self, artist: &str, album: &str) -> Result<Option<AlbumLabel>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT artist, album, label, fetched_at
             FROM album_labels WHERE artist = ?1 AND album = ?2",
        )?;
        let result = stmt
            .query_row(params![artist, album], |row| {
                Ok(AlbumLabel {
                    artist: row.get(0)?,
                    album: row.get(1)?,
                    label: row.get(2)?,
                    fetched_at: row.get(3)?,
                })
            })
            .optional()?;
        Ok(result)
    }

    fn upsert_album_label(&self, label: &AlbumLabel) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO album_labels (artist, album, label, fetched_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![label.artist, label.album, label.label, label.fetched_at],
        )?;
        Ok(())
    }

    fn get_stats(&self) -> Result<EnrichmentStats> {
        let conn = self.read_conn.lock().unwrap();
        Self::count_rows(&conn)
    }
}
