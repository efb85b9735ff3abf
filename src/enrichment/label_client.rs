//! Discogs release-search client for record labels.
//!
//! Rate limited to 1 request per second per Discogs API guidelines for
//! authenticated clients.

use crate::config::EnrichmentSettings;
use crate::fetch::{CallGate, FetchError, RetryPolicy};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const DISCOGS_API_BASE: &str = "https://api.discogs.com/database/search";
const USER_AGENT: &str = concat!("scrobble-overlap/", env!("CARGO_PKG_VERSION"));

/// Source of record labels for an (artist, album) release.
pub trait LabelSource: Send + Sync {
    /// Record label of the best-matching release, or `None` when Discogs has
    /// no match for the pair.
    fn album_label(&self, artist: &str, album: &str) -> Result<Option<String>, FetchError>;
}

pub struct DiscogsLabelClient {
    client: Client,
    token: String,
    gate: CallGate,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    label: Vec<String>,
}

impl DiscogsLabelClient {
    pub fn new(token: &str, settings: &EnrichmentSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            gate: CallGate::new(Duration::from_millis(settings.label_interval_ms)),
            retry: RetryPolicy::new(&settings.retry),
        })
    }

    fn try_get_label(&self, artist: &str, album: &str) -> Result<Option<String>, FetchError> {
        let response = self
            .client
            .get(DISCOGS_API_BASE)
            .header("Authorization", format!("Discogs token={}", self.token))
            .query(&[
                ("artist", artist),
                ("release_title", album),
                ("type", "release"),
                ("per_page", "1"),
            ])
            .send()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }
        // Discogs sends 429 when the pacing window is overrun
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "Discogs API failed with status {}",
                status
            )));
        }

        let body: SearchResponse = response
            .json()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        let label = body
            .results
            .into_iter()
            .next()
            .and_then(|r| r.label.into_iter().next())
            .filter(|l| !l.is_empty());

        Ok(label)
    }
}

impl LabelSource for DiscogsLabelClient {
    fn album_label(&self, artist: &str, album: &str) -> Result<Option<String>, FetchError> {
        let mut attempt = 0;
        loop {
            self.gate.wait();
            match self.try_get_label(artist, album) {
                Ok(label) => return Ok(label),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "Label lookup for {} / {} failed ({}), retrying in {:?}",
                        artist, album, error, backoff
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
