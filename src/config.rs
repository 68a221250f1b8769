//! Runtime configuration from environment variables

use std::env;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the trend tracking runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// YouTube Data API v3 key (required)
    pub api_key: String,

    /// Path to SQLite database file
    pub db_path: String,

    /// ISO country codes whose trending charts are polled
    pub tracked_regions: Vec<String>,

    /// Wall-clock interval between fetch cycles, in seconds
    pub fetch_interval_secs: u64,

    /// Maximum age of the category cache before a refresh, in hours
    pub category_cache_hours: u64,

    /// Items requested per region per cycle
    pub trending_max_results: u32,

    /// HTTP timeout for calls to the video source, in seconds
    pub source_timeout_secs: u64,

    /// Batch partition size for the reconcile write path
    pub reconcile_chunk_size: usize,

    /// Relative view-count increase that qualifies as a viral spike
    pub spike_threshold: f64,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `YOUTUBE_API_KEY` (required)
    /// - `TRENDWATCH_DB_PATH` (default: trendwatch.db)
    /// - `TRACKED_REGIONS` (default: US,IN,GB,CA,DE,FR,JP,AU)
    /// - `FETCH_INTERVAL_SECS` (default: 21600)
    /// - `CATEGORY_CACHE_HOURS` (default: 24)
    /// - `TRENDING_MAX_RESULTS` (default: 50)
    /// - `SOURCE_TIMEOUT_SECS` (default: 10)
    /// - `RECONCILE_CHUNK_SIZE` (default: 100)
    /// - `SPIKE_THRESHOLD` (default: 0.5)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("YOUTUBE_API_KEY")
            .map_err(|_| ConfigError::MissingVariable("YOUTUBE_API_KEY".to_string()))?;

        let tracked_regions: Vec<String> = env::var("TRACKED_REGIONS")
            .unwrap_or_else(|_| "US,IN,GB,CA,DE,FR,JP,AU".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if tracked_regions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "TRACKED_REGIONS must contain at least one country code".to_string(),
            ));
        }

        let spike_threshold = env::var("SPIKE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.5);

        if spike_threshold <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "SPIKE_THRESHOLD must be positive".to_string(),
            ));
        }

        Ok(Self {
            api_key,

            db_path: env::var("TRENDWATCH_DB_PATH")
                .unwrap_or_else(|_| "trendwatch.db".to_string()),

            tracked_regions,

            fetch_interval_secs: env::var("FETCH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6 * 60 * 60),

            category_cache_hours: env::var("CATEGORY_CACHE_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(24),

            trending_max_results: env::var("TRENDING_MAX_RESULTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),

            source_timeout_secs: env::var("SOURCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            reconcile_chunk_size: env::var("RECONCILE_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),

            spike_threshold,
        })
    }
}
