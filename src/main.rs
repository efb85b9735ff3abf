use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scrobble_overlap::aggregate::Dimension;
use scrobble_overlap::config;
use scrobble_overlap::engine::{Engine, RunOutcome};
use scrobble_overlap::enrichment::{
    DiscogsLabelClient, EnrichmentCache, LastFmTagClient, SqliteEnrichmentStore,
};
use scrobble_overlap::fetch::LastFmClient;
use scrobble_overlap::period::PeriodSpec;
use scrobble_overlap::store::MatchCacheStore;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

/// "YYYY-MM" into (month, year).
fn parse_month(s: &str) -> Result<(u32, i32), String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| format!("Expected YYYY-MM, got '{}'", s))?;
    let year: i32 = year.parse().map_err(|_| format!("Invalid year in '{}'", s))?;
    let month: u32 = month
        .parse()
        .map_err(|_| format!("Invalid month in '{}'", s))?;
    if !(1..=12).contains(&month) {
        return Err(format!("Month out of range in '{}'", s));
    }
    Ok((month, year))
}

#[derive(Parser, Debug)]
#[clap(about = "Cross-user scrobble overlap reports")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (enrichment.db, match_cache.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The 7-day window ending N weeks before today (0 = the previous 7 full days).
    #[clap(long, value_name = "N", conflicts_with_all = ["monthly", "yearly", "years_back"])]
    pub weekly: Option<u32>,

    /// A calendar month, as YYYY-MM.
    #[clap(long, value_parser = parse_month, conflicts_with_all = ["yearly", "years_back"])]
    pub monthly: Option<(u32, i32)>,

    /// The calendar year N years before the current one (0 = this year).
    #[clap(long, value_name = "N", conflicts_with = "years_back")]
    pub yearly: Option<u32>,

    /// The rolling window covering the last N years.
    #[clap(long, value_name = "N")]
    pub years_back: Option<u32>,

    /// Where to write the JSON snapshot of the period's overlap tables.
    #[clap(long, value_parser = parse_path)]
    pub output: Option<PathBuf>,

    /// Usernames to compare. Can also be specified in config file.
    pub users: Vec<String>,
}

impl CliArgs {
    fn period_spec(&self) -> Result<PeriodSpec> {
        let spec = match (self.weekly, self.monthly, self.yearly, self.years_back) {
            (Some(offset), None, None, None) => PeriodSpec::Weekly { offset },
            (None, Some((month, year)), None, None) => PeriodSpec::Monthly { month, year },
            (None, None, Some(years_ago), None) => PeriodSpec::Yearly { years_ago },
            (None, None, None, Some(years)) => PeriodSpec::YearsBack { years },
            _ => bail!("Exactly one of --weekly, --monthly, --yearly, --years-back is required"),
        };
        Ok(spec)
    }
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            users: args.users.clone(),
            lastfm_api_key: std::env::var("LASTFM_API_KEY").ok(),
            discogs_token: std::env::var("DISCOGS_TOKEN").ok(),
            output_path: args.output.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let spec = cli_args.period_spec()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  users: {:?}", app_config.users);
    info!(
        "  label enrichment: {}",
        if app_config.discogs_token.is_some() {
            "enabled"
        } else {
            "disabled (no token)"
        }
    );

    let enrichment_store = SqliteEnrichmentStore::new(app_config.enrichment_db_path())?;
    let tag_client = LastFmTagClient::new(&app_config.lastfm_api_key, &app_config.enrichment)?;
    let label_client = match &app_config.discogs_token {
        Some(token) => Some(Box::new(DiscogsLabelClient::new(
            token,
            &app_config.enrichment,
        )?) as Box<dyn scrobble_overlap::enrichment::LabelSource>),
        None => None,
    };
    let enrichment = EnrichmentCache::new(
        Box::new(enrichment_store),
        Box::new(tag_client),
        label_client,
    );

    let match_cache = MatchCacheStore::new(app_config.match_cache_db_path())?;
    let scrobble_client = LastFmClient::new(&app_config.lastfm_api_key, &app_config.fetcher)?;

    let engine = Engine::new(
        app_config.users.clone(),
        Box::new(scrobble_client),
        enrichment,
        match_cache,
    );

    let report = engine.run(&spec, Utc::now())?;

    match &report.outcome {
        RunOutcome::Cached => info!("Period {} served from cache", report.period.key),
        RunOutcome::Computed => {
            info!("Period {} computed", report.period.key);
            for (user, count) in &report.scrobbles_per_user {
                info!("  {}: {} scrobbles", user, count);
            }
        }
        RunOutcome::Partial { incomplete_users } => {
            warn!(
                "Period {} computed WITHOUT complete data for {:?}",
                report.period.key, incomplete_users
            );
            for (user, count) in &report.scrobbles_per_user {
                info!("  {}: {} scrobbles", user, count);
            }
        }
    }
    for dim in Dimension::ALL {
        let count = report
            .record
            .dimensions
            .get(&dim)
            .map(|entries| entries.len())
            .unwrap_or(0);
        info!("  {} overlaps: {}", dim.as_str(), count);
    }
    let failures = report.lookup_failures;
    if failures.tags > 0 || failures.labels > 0 {
        warn!(
            "Enrichment lookups failed: {} tag, {} label (will retry next run)",
            failures.tags, failures.labels
        );
    }

    if let Some(output) = &app_config.output_path {
        let snapshot = report.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(output, json)?;
        info!("Snapshot written to {:?}", output);
    }

    Ok(())
}
