use std::env;
use std::fmt;
use std::time::Duration;

use crate::services::ingestion::DEFAULT_MAX_CONCURRENCY;
use crate::services::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub github_api_url: String,
    pub github_token: String,
    pub ingest_max_concurrency: usize,
    pub fetch_max_retries: u32,
    pub fetch_retry_base_ms: u64,
    pub fetch_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://scanledger.db?mode=rwc".to_string()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            github_token: env::var("PERSONAL_ACCESS_TOKEN")?,
            ingest_max_concurrency: env::var("INGEST_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONCURRENCY),
            fetch_max_retries: env::var("FETCH_MAX_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            fetch_retry_base_ms: env::var("FETCH_RETRY_BASE_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }

    /// Retry policy for remote content requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.fetch_max_retries,
            base_delay: Duration::from_millis(self.fetch_retry_base_ms),
            backoff_factor: 2,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("database_max_connections", &self.database_max_connections)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("github_api_url", &self.github_api_url)
            .field("github_token", &"<redacted>")
            .field("ingest_max_concurrency", &self.ingest_max_concurrency)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("fetch_retry_base_ms", &self.fetch_retry_base_ms)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .finish()
    }
}
