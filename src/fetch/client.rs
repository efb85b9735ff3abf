//! Last.fm recent-tracks client.
//!
//! Paginated, time-descending fetch with request pacing (~5 req/s per
//! Last.fm API guidelines) and bounded retry with exponential backoff.

use super::pacing::CallGate;
use super::retry::RetryPolicy;
use super::types::{RecentTracksResponse, Scrobble};
use super::{FetchError, ScrobbleSource};
use crate::config::FetcherSettings;
use anyhow::Result;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

pub struct LastFmClient {
    client: Client,
    api_key: String,
    gate: CallGate,
    retry: RetryPolicy,
    page_size: usize,
}

impl LastFmClient {
    pub fn new(api_key: &str, settings: &FetcherSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            gate: CallGate::new(Duration::from_millis(settings.request_interval_ms)),
            retry: RetryPolicy::new(&settings.retry),
            page_size: settings.page_size,
        })
    }

    fn get_page(
        &self,
        user: &str,
        page: u32,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<RecentTracksResponse, FetchError> {
        let mut attempt = 0;
        loop {
            self.gate.wait();
            match self.try_get_page(user, page, start_ts, end_ts) {
                Ok(response) => return Ok(response),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "Fetch page {} for {} failed ({}), retrying in {:?}",
                        page, user, error, backoff
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn try_get_page(
        &self,
        user: &str,
        page: u32,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<RecentTracksResponse, FetchError> {
        let response = self
            .client
            .get(LASTFM_API_BASE)
            .query(&[
                ("method", "user.getrecenttracks"),
                ("user", user),
                ("api_key", &self.api_key),
                ("format", "json"),
                ("extended", "1"),
                ("limit", &self.page_size.to_string()),
                ("page", &page.to_string()),
                ("from", &start_ts.to_string()),
                ("to", &end_ts.to_string()),
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

        response
            .json::<RecentTracksResponse>()
            .map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

impl ScrobbleSource for LastFmClient {
    fn fetch_scrobbles(
        &self,
        user: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<Scrobble>, FetchError> {
        let mut scrobbles = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self.get_page(user, page, start_ts, end_ts)?;
            let Some(recent) = response.recenttracks else {
                return Err(FetchError::Malformed(
                    "response missing recenttracks".to_string(),
                ));
            };

            let total_pages = recent.attr.as_ref().and_then(|a| a.total_pages());
            let page_len = recent.track.len();
            let mut reached_interval_start = false;

            for track in recent.track {
                let Some(scrobble) = track.into_scrobble(user) else {
                    continue;
                };
                // Pages are timestamp-descending; anything older than the
                // interval start means the rest of the history is too.
                if scrobble.timestamp < start_ts {
                    reached_interval_start = true;
                    break;
                }
                if scrobble.timestamp < end_ts {
                    scrobbles.push(scrobble);
                }
            }

            debug!(
                "Fetched page {}/{} for {}: {} records kept so far",
                page,
                total_pages.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string()),
                user,
                scrobbles.len()
            );

            let last_page = match total_pages {
                Some(total) => page >= total,
                None => page_len < self.page_size,
            };
            if reached_interval_start || last_page || page_len < self.page_size {
                break;
            }
            page += 1;
        }

        Ok(scrobbles)
    }
}
