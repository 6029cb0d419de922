use anyhow::{Context, Result};

/// API server configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// When set, pending TSCR results live in Redis instead of process memory.
    pub redis_url: Option<String>,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub keyword_cache_enabled: bool,
    pub keyword_cache_refresh_secs: u64,
    pub tscr_background_timeout_secs: u64,
    pub tscr_pending_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            keyword_cache_enabled: parse_env("KEYWORD_CACHE_ENABLED", true)?,
            keyword_cache_refresh_secs: parse_env("KEYWORD_CACHE_REFRESH_SECS", 3600)?,
            tscr_background_timeout_secs: parse_env("TSCR_BACKGROUND_TIMEOUT_SECS", 10)?,
            tscr_pending_ttl_secs: parse_env("TSCR_PENDING_TTL_SECS", 300)?,
        })
    }
}

/// Configuration for the batch import runner.
///
/// Source credentials are optional: a missing key skips that source.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub apify_token: Option<String>,
    pub serper_api_key: Option<String>,
    pub unsplash_access_key: Option<String>,
    pub rust_log: String,
}

impl ImportConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(ImportConfig {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            apify_token: optional_env("APIFY_TOKEN"),
            serper_api_key: optional_env("SERPER_API_KEY"),
            unsplash_access_key: optional_env("UNSPLASH_ACCESS_KEY"),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
