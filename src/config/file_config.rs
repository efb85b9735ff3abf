//! TOML file configuration.
//!
//! Every field is optional; [`crate::config::AppConfig::resolve`] merges the
//! file with CLI arguments and fills in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    /// Roster of service usernames to compare.
    pub users: Option<Vec<String>>,
    pub lastfm_api_key: Option<String>,
    pub discogs_token: Option<String>,
    pub output_path: Option<String>,
    pub fetcher: Option<FetcherConfig>,
    pub enrichment: Option<EnrichmentConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetcherConfig {
    pub page_size: Option<usize>,
    pub request_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    pub tag_interval_ms: Option<u64>,
    pub label_interval_ms: Option<u64>,
    pub tag_limit: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: FileConfig = toml::from_str(
            r#"
            db_dir = "/var/lib/overlap"
            users = ["alice", "bob", "carol"]
            lastfm_api_key = "key123"
            discogs_token = "tok456"

            [fetcher]
            page_size = 100
            request_interval_ms = 250

            [fetcher.retry]
            max_retries = 5

            [enrichment]
            tag_limit = 3
            label_interval_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.db_dir, Some("/var/lib/overlap".to_string()));
        assert_eq!(config.users.as_ref().unwrap().len(), 3);
        assert_eq!(config.fetcher.as_ref().unwrap().page_size, Some(100));
        assert_eq!(
            config.fetcher.unwrap().retry.unwrap().max_retries,
            Some(5)
        );
        assert_eq!(config.enrichment.as_ref().unwrap().tag_limit, Some(3));
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.db_dir.is_none());
        assert!(config.users.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("not_a_real_field = 1");
        assert!(result.is_err());
    }
}
