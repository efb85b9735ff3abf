//! Run orchestration: resolve the period, probe the cache, and when
//! needed run the fetch, enrich, aggregate and commit pipeline.

use crate::aggregate::{aggregate_all, Dimension, Enrichment, MatchEntry};
use crate::enrichment::{EnrichmentCache, LookupFailures};
use crate::fetch::{FetchError, Scrobble, ScrobbleSource};
use crate::period::{Period, PeriodSpec};
use crate::store::{MatchCacheStore, PeriodRecord};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// How a period's record was produced on this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Closed period served verbatim from the durable store, zero network.
    Cached,
    /// Full pipeline ran and every user's fetch completed.
    Computed,
    /// Pipeline ran but some users' fetches failed after retries; their
    /// scrobbles are missing from the record.
    Partial { incomplete_users: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub period: Period,
    pub outcome: RunOutcome,
    pub record: PeriodRecord,
    /// Scrobbles fetched per user; empty on a cache hit.
    pub scrobbles_per_user: BTreeMap<String, usize>,
    pub lookup_failures: LookupFailures,
}

/// Presentation-independent snapshot of one period's overlap tables.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSnapshot {
    pub period_kind: String,
    pub period_key: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub closed: bool,
    pub computed_at: i64,
    pub dimensions: BTreeMap<Dimension, Vec<MatchEntry>>,
}

impl RunReport {
    pub fn snapshot(&self) -> PeriodSnapshot {
        PeriodSnapshot {
            period_kind: self.period.kind.as_str().to_string(),
            period_key: self.period.key.clone(),
            start_ts: self.period.start_ts(),
            end_ts: self.period.end_ts(),
            closed: self.record.closed,
            computed_at: self.record.computed_at,
            dimensions: self.record.dimensions.clone(),
        }
    }
}

pub struct Engine {
    users: Vec<String>,
    source: Box<dyn ScrobbleSource>,
    enrichment: EnrichmentCache,
    store: MatchCacheStore,
}

impl Engine {
    pub fn new(
        users: Vec<String>,
        source: Box<dyn ScrobbleSource>,
        enrichment: EnrichmentCache,
        store: MatchCacheStore,
    ) -> Self {
        Self {
            users,
            source,
            enrichment,
            store,
        }
    }

    /// Process one period. Serves a stored closed record as-is; anything
    /// else runs the full fetch, enrich, aggregate and commit pipeline and
    /// overwrites the stored record wholesale.
    pub fn run(&self, spec: &PeriodSpec, now: DateTime<Utc>) -> Result<RunReport> {
        let period = spec.resolve(now)?;
        info!(
            "Processing period {} [{} .. {}), closed={}",
            period.key, period.start, period.end, period.closed
        );

        if let Some(record) = self.store.get_record(&period)? {
            // Only a record marked closed is final; an open record is stale
            // even when the period itself has since closed.
            if record.closed {
                info!("Serving {} from cache", period.key);
                return Ok(RunReport {
                    period,
                    outcome: RunOutcome::Cached,
                    record,
                    scrobbles_per_user: BTreeMap::new(),
                    lookup_failures: LookupFailures::default(),
                });
            }
        }

        let (scrobbles, scrobbles_per_user, incomplete_users) = self.fetch_all_users(&period)?;
        if incomplete_users.len() == self.users.len() {
            bail!("Every user fetch failed for {}", period.key);
        }

        let enrichment = self.resolve_enrichment(&scrobbles)?;
        let dimensions = aggregate_all(&scrobbles, &enrichment);

        // A record built from incomplete fetches is never marked closed,
        // so the next run recomputes it.
        let record = PeriodRecord {
            dimensions,
            computed_at: now.timestamp(),
            closed: period.closed && incomplete_users.is_empty(),
        };
        self.store
            .put_record(&period, &record)
            .with_context(|| format!("Failed to persist record for {}", period.key))?;

        let outcome = if incomplete_users.is_empty() {
            RunOutcome::Computed
        } else {
            warn!(
                "Period {} computed with incomplete users: {:?}",
                period.key, incomplete_users
            );
            RunOutcome::Partial { incomplete_users }
        };

        Ok(RunReport {
            period,
            outcome,
            record,
            scrobbles_per_user,
            lookup_failures: self.enrichment.failures(),
        })
    }

    /// Fetch every user sequentially. Authentication failures abort;
    /// exhausted transient failures mark the user incomplete and the run
    /// continues.
    fn fetch_all_users(
        &self,
        period: &Period,
    ) -> Result<(Vec<Scrobble>, BTreeMap<String, usize>, Vec<String>)> {
        let mut scrobbles = Vec::new();
        let mut per_user = BTreeMap::new();
        let mut incomplete = Vec::new();

        for user in &self.users {
            match self
                .source
                .fetch_scrobbles(user, period.start_ts(), period.end_ts())
            {
                Ok(fetched) => {
                    info!("Fetched {} scrobbles for {}", fetched.len(), user);
                    per_user.insert(user.clone(), fetched.len());
                    scrobbles.extend(fetched);
                }
                Err(FetchError::Auth { status }) => {
                    bail!("Scrobble source rejected the API key (HTTP {status})")
                }
                Err(error) => {
                    warn!("Fetch for {} failed after retries: {}", user, error);
                    incomplete.push(user.clone());
                }
            }
        }

        Ok((scrobbles, per_user, incomplete))
    }

    /// Resolve tags and labels for every distinct artist and release in the
    /// period ahead of aggregation, deduplicated by casefolded key.
    fn resolve_enrichment(&self, scrobbles: &[Scrobble]) -> Result<Enrichment> {
        let mut artists: HashMap<String, String> = HashMap::new();
        let mut releases: HashMap<(String, String), (String, String)> = HashMap::new();

        for scrobble in scrobbles {
            let artist_key = scrobble.artist.to_lowercase();
            artists
                .entry(artist_key.clone())
                .or_insert_with(|| scrobble.artist.clone());
            if let Some(album) = &scrobble.album {
                releases
                    .entry((artist_key, album.to_lowercase()))
                    .or_insert_with(|| (scrobble.artist.clone(), album.clone()));
            }
        }

        let mut enrichment = Enrichment::default();
        for (key, display) in artists {
            let tags = self.enrichment.tags_for(&display)?;
            enrichment.artist_tags.insert(key, tags);
        }
        for (key, (artist, album)) in releases {
            let label = self.enrichment.label_for(&artist, &album)?;
            enrichment.album_labels.insert(key, label);
        }
        Ok(enrichment)
    }
}
