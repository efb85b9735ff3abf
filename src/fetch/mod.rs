//! Rate-limited scrobble fetching from the Last.fm API.

mod client;
mod pacing;
mod retry;
mod types;

pub use client::LastFmClient;
pub use pacing::CallGate;
pub use retry::RetryPolicy;
pub use types::Scrobble;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Invalid or rejected credentials. Never retried; aborts the run.
    #[error("authentication failed (HTTP {status})")]
    Auth { status: u16 },
    /// Timeouts, connection failures, rate-limit responses and server
    /// errors. Retried with backoff.
    #[error("transient error: {0}")]
    Transient(String),
    /// The response body did not match the expected shape. Retried, since
    /// truncated bodies usually come from flaky upstream responses.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Auth { .. })
    }
}

/// Source of scrobbles for one user within a half-open timestamp interval.
///
/// Implemented by [`LastFmClient`]; the engine only depends on this trait so
/// tests can substitute canned sources.
pub trait ScrobbleSource: Send + Sync {
    /// Fetch every scrobble for `user` with `start_ts <= timestamp < end_ts`
    /// (unix seconds), newest first.
    fn fetch_scrobbles(
        &self,
        user: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<Scrobble>, FetchError>;
}
