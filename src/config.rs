//! Settings for fetching and caching the catalog

use std::path::PathBuf;
use std::time::Duration;

/// Catalog endpoint used when none is configured
pub const DEFAULT_CATALOG_URL: &str = "http://localhost:8000/api/categories/";

/// Configuration for the catalog service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// URL answering a GET with the flat category array
    pub endpoint: String,
    /// How long a fetched catalog is served without refetching
    pub ttl: Duration,
    /// Upper bound on a single fetch attempt
    pub timeout: Duration,
    /// Extra attempts after a failed fetch before giving up
    pub retries: u32,
    /// Delay before the first retry, doubled for each later one
    pub retry_backoff: Duration,
    /// Directory for the last-known-good snapshot on disk, if any
    pub disk_cache: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CATALOG_URL.to_string(),
            ttl: Duration::from_secs(300),          // 5 minutes
            timeout: Duration::from_secs(10),
            retries: 0,
            retry_backoff: Duration::from_millis(250),
            disk_cache: None,
        }
    }
}

impl CatalogConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn with_disk_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.disk_cache = Some(dir.into());
        self
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor)
    }
}
