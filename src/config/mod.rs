mod file_config;

pub use file_config::{EnrichmentConfig, FetcherConfig, FileConfig, RetryConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that participate in config resolution. Values from the TOML
/// file override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub users: Vec<String>,
    /// Taken from the LASTFM_API_KEY environment variable.
    pub lastfm_api_key: Option<String>,
    /// Taken from the DISCOGS_TOKEN environment variable.
    pub discogs_token: Option<String>,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub users: Vec<String>,
    pub lastfm_api_key: String,
    /// Absent token disables label enrichment entirely.
    pub discogs_token: Option<String>,
    pub output_path: Option<PathBuf>,
    pub fetcher: FetcherSettings,
    pub enrichment: EnrichmentSettings,
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub page_size: usize,
    pub request_interval_ms: u64,
    pub timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            request_interval_ms: 200, // ~5 req/s
            timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    /// Pacing for Last.fm tag lookups.
    pub tag_interval_ms: u64,
    /// Pacing for Discogs label lookups.
    pub label_interval_ms: u64,
    /// Maximum number of genre tags kept per artist.
    pub tag_limit: usize,
    pub timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            tag_interval_ms: 200,    // ~5 req/s
            label_interval_ms: 1000, // ~1 req/s
            tag_limit: 5,
            timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

fn resolve_retry(file: Option<RetryConfig>) -> RetrySettings {
    let file = file.unwrap_or_default();
    let defaults = RetrySettings::default();
    RetrySettings {
        max_retries: file.max_retries.unwrap_or(defaults.max_retries),
        initial_backoff_ms: file.initial_backoff_ms.unwrap_or(defaults.initial_backoff_ms),
        max_backoff_ms: file.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
        backoff_multiplier: file.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present. Missing
    /// credentials or an empty roster are fatal (aborts before any fetch).
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let users = file.users.unwrap_or_else(|| cli.users.clone());
        if users.len() < 2 {
            bail!("At least 2 users are required to compute overlaps, got {}", users.len());
        }

        let lastfm_api_key = file
            .lastfm_api_key
            .or_else(|| cli.lastfm_api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Last.fm API key must be set via LASTFM_API_KEY or in config file"
                )
            })?;

        let discogs_token = file
            .discogs_token
            .or_else(|| cli.discogs_token.clone())
            .filter(|t| !t.trim().is_empty());

        let output_path = file
            .output_path
            .map(PathBuf::from)
            .or_else(|| cli.output_path.clone());

        let fetcher_file = file.fetcher.unwrap_or_default();
        let fetcher_defaults = FetcherSettings::default();
        let fetcher = FetcherSettings {
            page_size: fetcher_file.page_size.unwrap_or(fetcher_defaults.page_size),
            request_interval_ms: fetcher_file
                .request_interval_ms
                .unwrap_or(fetcher_defaults.request_interval_ms),
            timeout_secs: fetcher_file.timeout_secs.unwrap_or(fetcher_defaults.timeout_secs),
            retry: resolve_retry(fetcher_file.retry),
        };

        let enrichment_file = file.enrichment.unwrap_or_default();
        let enrichment_defaults = EnrichmentSettings::default();
        let enrichment = EnrichmentSettings {
            tag_interval_ms: enrichment_file
                .tag_interval_ms
                .unwrap_or(enrichment_defaults.tag_interval_ms),
            label_interval_ms: enrichment_file
                .label_interval_ms
                .unwrap_or(enrichment_defaults.label_interval_ms),
            tag_limit: enrichment_file.tag_limit.unwrap_or(enrichment_defaults.tag_limit),
            timeout_secs: enrichment_file
                .timeout_secs
                .unwrap_or(enrichment_defaults.timeout_secs),
            retry: resolve_retry(enrichment_file.retry),
        };

        Ok(Self {
            db_dir,
            users,
            lastfm_api_key,
            discogs_token,
            output_path,
            fetcher,
            enrichment,
        })
    }

    pub fn enrichment_db_path(&self) -> PathBuf {
        self.db_dir.join("enrichment.db")
    }

    pub fn match_cache_db_path(&self) -> PathBuf {
        self.db_dir.join("match_cache.db")
    }
}
