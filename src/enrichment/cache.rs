//! Enrichment cache: in-memory layer over the durable store and the
//! remote tag/label clients.
//!
//! Lookup order is memory, then SQLite, then the network. Successful
//! network lookups (including empty results) are persisted so they are
//! never repeated across runs. Failed lookups are NOT persisted, so the
//! next run retries them.

use super::label_client::LabelSource;
use super::models::{AlbumLabel, ArtistTags};
use super::tag_client::TagSource;
use super::trait_def::EnrichmentStore;
use crate::fetch::FetchError;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::warn;

/// Lookups that hit the network and failed after retries were exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFailures {
    pub tags: usize,
    pub labels: usize,
}

pub struct EnrichmentCache {
    store: Box<dyn EnrichmentStore>,
    tag_source: Box<dyn TagSource>,
    /// Absent when no Discogs token is configured; label lookups then
    /// resolve to unknown without touching the network.
    label_source: Option<Box<dyn LabelSource>>,
    tags_mem: Mutex<HashMap<String, Vec<String>>>,
    labels_mem: Mutex<HashMap<(String, String), Option<String>>>,
    failed_tags: AtomicUsize,
    failed_labels: AtomicUsize,
}

impl EnrichmentCache {
    pub fn new(
        store: Box<dyn EnrichmentStore>,
        tag_source: Box<dyn TagSource>,
        label_source: Option<Box<dyn LabelSource>>,
    ) -> Self {
        Self {
            store,
            tag_source,
            label_source,
            tags_mem: Mutex::new(HashMap::new()),
            labels_mem: Mutex::new(HashMap::new()),
            failed_tags: AtomicUsize::new(0),
            failed_labels: AtomicUsize::new(0),
        }
    }

    /// Genre tags for an artist. Case-insensitive: "Portishead" and
    /// "portishead" share one cache entry. Degrades to an empty list when
    /// the remote lookup fails for anything other than bad credentials.
    pub fn tags_for(&self, artist: &str) -> Result<Vec<String>> {
        let key = artist.to_lowercase();

        if let Some(tags) = self.tags_mem.lock().unwrap().get(&key) {
            return Ok(tags.clone());
        }

        if let Some(cached) = self.store.get_artist_tags(&key)? {
            self.tags_mem
                .lock()
                .unwrap()
                .insert(key, cached.tags.clone());
            return Ok(cached.tags);
        }

        let tags = match self.tag_source.artist_tags(artist) {
            Ok(tags) => tags,
            Err(FetchError::Auth { status }) => {
                bail!("Last.fm rejected the API key during tag lookup (HTTP {status})")
            }
            Err(error) => {
                warn!("Giving up on tags for {}: {}", artist, error);
                self.failed_tags.fetch_add(1, Ordering::Relaxed);
                return Ok(Vec::new());
            }
        };

        self.store.upsert_artist_tags(&ArtistTags {
            artist: key.clone(),
            tags: tags.clone(),
            fetched_at: chrono::Utc::now().timestamp(),
        })?;
        self.tags_mem.lock().unwrap().insert(key, tags.clone());
        Ok(tags)
    }

    /// Record label for an (artist, album) pair, or `None` when unknown.
    /// Returns `None` without any network traffic when no label source is
    /// configured.
    pub fn label_for(&self, artist: &str, album: &str) -> Result<Option<String>> {
        let Some(source) = self.label_source.as_ref() else {
            return Ok(None);
        };

        let key = (artist.to_lowercase(), album.to_lowercase());

        if let Some(label) = self.labels_mem.lock().unwrap().get(&key) {
            return Ok(label.clone());
        }

        if let Some(cached) = self.store.get_album_label(&key.0, &key.1)? {
            self.labels_mem
                .lock()
                .unwrap()
                .insert(key, cached.label.clone());
            return Ok(cached.label);
        }

        let label = match source.album_label(artist, album) {
            Ok(label) => label,
            Err(FetchError::Auth { status }) => {
                bail!("Discogs rejected the token during label lookup (HTTP {status})")
            }
            Err(error) => {
                warn!("Giving up on label for {} / {}: {}", artist, album, error);
                self.failed_labels.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        self.store.upsert_album_label(&AlbumLabel {
            artist: key.0.clone(),
            album: key.1.clone(),
            label: label.clone(),
            fetched_at: chrono::Utc::now().timestamp(),
        })?;
        self.labels_mem.lock().unwrap().insert(key, label.clone());
        Ok(label)
    }

    pub fn failures(&self) -> LookupFailures {
        LookupFailures {
            tags: self.failed_tags.load(Ordering::Relaxed),
            labels: self.failed_labels.load(Ordering::Relaxed),
        }
    }
}
