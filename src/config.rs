use anyhow::Result;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_port: u16,
    pub database_url: String,
    /// Public base URL used to build post permalinks
    pub site_url: String,
    /// Base URL of the posts REST endpoint the lookup talks to
    pub api_url: String,
    pub lookup: LookupConfig,
}

/// Tuning for the interactive post lookup
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub debounce: Duration,
    pub http_timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(400),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (don't fail if it doesn't)
        let _ = dotenvy::dotenv();

        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:read_more.db".to_string());

        let site_url = std::env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", api_port));

        let api_url = std::env::var("READ_MORE_API_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/wp/v2", api_port));

        let debounce_ms: u64 = std::env::var("LOOKUP_DEBOUNCE_MS")
            .unwrap_or_else(|_| "400".to_string())
            .parse()?;

        let http_timeout_secs: u64 = std::env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        if http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Config {
            api_port,
            database_url,
            site_url: site_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            lookup: LookupConfig {
                debounce: Duration::from_millis(debounce_ms),
                http_timeout: Duration::from_secs(http_timeout_secs),
            },
        })
    }
}
