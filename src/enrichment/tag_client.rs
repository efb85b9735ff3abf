//! Last.fm artist top-tags client.
//!
//! Rate limited to 5 requests per second per Last.fm API guidelines, shared
//! retry policy with the scrobble fetcher.

use crate::config::EnrichmentSettings;
use crate::fetch::{CallGate, FetchError, RetryPolicy};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

/// Source of genre tags for an artist.
pub trait TagSource: Send + Sync {
    /// Top tags for `artist`, most popular first, capped at the configured
    /// limit. An empty list means Last.fm knows the artist but has no tags
    /// for it.
    fn artist_tags(&self, artist: &str) -> Result<Vec<String>, FetchError>;
}

pub struct LastFmTagClient {
    client: Client,
    api_key: String,
    gate: CallGate,
    retry: RetryPolicy,
    tag_limit: usize,
}

#[derive(Deserialize)]
struct TopTagsResponse {
    toptags: Option<TopTags>,
}

#[derive(Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: Vec<LastFmTag>,
}

#[derive(Deserialize)]
struct LastFmTag {
    name: Option<String>,
}

impl LastFmTagClient {
    pub fn new(api_key: &str, settings: &EnrichmentSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            gate: CallGate::new(Duration::from_millis(settings.tag_interval_ms)),
            retry: RetryPolicy::new(&settings.retry),
            tag_limit: settings.tag_limit,
        })
    }

    fn try_get_tags(&self, artist: &str) -> Result<Vec<String>, FetchError> {
        let response = self
            .client
            .get(LASTFM_API_BASE)
            .query(&[
                ("method", "artist.gettoptags"),
                ("artist", artist),
                ("api_key", &self.api_key),
                ("format", "json"),
                ("autocorrect", "1"),
            ])
            .send()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "Last.fm API failed with status {}",
                status
            )));
        }

        let body: TopTagsResponse = response
            .json()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        // An unknown artist comes back as an error body without toptags;
        // treat it as a tagless artist rather than a failure.
        let tags = body
            .toptags
            .map(|t| t.tag)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| t.name)
            .filter(|name| !name.is_empty())
            .take(self.tag_limit)
            .collect();

        Ok(tags)
    }
}

impl TagSource for LastFmTagClient {
    fn artist_tags(&self, artist: &str) -> Result<Vec<String>, FetchError> {
        let mut attempt = 0;
        loop {
            self.gate.wait();
            match self.try_get_tags(artist) {
                Ok(tags) => return Ok(tags),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "Tag lookup for {} failed ({}), retrying in {:?}",
                        artist, error, backoff
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
