//! SQLite-backed match cache store.

use super::schema::MATCH_CACHE_VERSIONED_SCHEMAS;
use super::PeriodRecord;
use crate::aggregate::{Dimension, MatchEntry};
use crate::period::Period;
use crate::sqlite_persistence::open_database;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Durable store of computed overlap tables, keyed by
/// (period kind, period key, dimension).
#[derive(Clone)]
pub struct MatchCacheStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl MatchCacheStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let (read_conn, write_conn) =
            open_database(db_path, MATCH_CACHE_VERSIONED_SCHEMAS, "match cache")?;
        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    /// Load the stored record for a period, all dimensions at once.
    /// `None` when the period has never been computed.
    pub fn get_record(&self, period: &Period) -> Result<Option<PeriodRecord>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT dimension, entries, computed_at, closed
             FROM match_cache WHERE period_kind = ?1 AND period_key = ?2",
        )?;

        let rows = stmt.query_map(params![period.kind.as_str(), period.key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut dimensions: BTreeMap<Dimension, Vec<MatchEntry>> = BTreeMap::new();
        let mut computed_at = 0i64;
        let mut closed = false;
        let mut found = false;

        for row in rows {
            let (dimension, entries_json, row_computed_at, row_closed) = row?;
            let Some(dimension) = Dimension::parse(&dimension) else {
                warn!("Unknown dimension {:?} in match cache, skipping", dimension);
                continue;
            };
            let entries: Vec<MatchEntry> = serde_json::from_str(&entries_json)
                .with_context(|| format!("Malformed cached entries for {}", period.key))?;
            dimensions.insert(dimension, entries);
            computed_at = row_computed_at;
            closed = row_closed;
            found = true;
        }

        if !found {
            return Ok(None);
        }

        debug!(
            "Match cache hit for {} ({} dimensions, closed={})",
            period.key,
            dimensions.len(),
            closed
        );
        Ok(Some(PeriodRecord {
            dimensions,
            computed_at,
            closed,
        }))
    }

    /// Persist a period's full result set as one transaction. Any previous
    /// rows for the period key are replaced wholesale, so a recomputed open
    /// period never keeps stale dimensions.
    pub fn put_record(&self, period: &Period, record: &PeriodRecord) -> Result<()> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM match_cache WHERE period_kind = ?1 AND period_key = ?2",
            params![period.kind.as_str(), period.key],
        )?;

        for (dimension, entries) in &record.dimensions {
            let entries_json = serde_json::to_string(entries)?;
            tx.execute(
                "INSERT INTO match_cache
                 (period_kind, period_key, dimension, entries, computed_at, closed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    period.kind.as_str(),
                    period.key,
                    dimension.as_str(),
                    entries_json,
                    record.computed_at,
                    record.closed,
                ],
            )?;
        }

        tx.commit()
            .with_context(|| format!("Failed to commit match cache record for {}", period.key))?;
        Ok(())
    }
}
