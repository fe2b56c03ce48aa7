//! Runtime configuration for the price feed, cache and service
//!
//! The command line (see [`crate::cli`]) is the only place these values are
//! read from; everything below it receives plain config structs.

use std::fmt;
use std::time::Duration;

/// Base URL for the EIA weekly retail gasoline and diesel price dataset
pub const EIA_BASE_URL: &str = "https://api.eia.gov/v2/petroleum/pri/gnd/data/";

/// EIA area code for the U.S. national average
pub const DEFAULT_AREA: &str = "NUS";

/// Rows requested per fetch. The feed interleaves products and areas within a
/// period, so this must cover a whole period, not just one row per grade.
pub const DEFAULT_PAGE_LENGTH: u32 = 5000;

/// How long a fetched snapshot stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on a single upstream fetch
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings for the upstream price feed client
#[derive(Clone)]
pub struct FeedConfig {
    /// EIA API credential
    pub api_key: String,
    /// Dataset endpoint (overridable for testing)
    pub base_url: String,
    /// Area facet to restrict the feed to; `None` requests every area
    pub area: Option<String>,
    /// Number of rows to request
    pub page_length: u32,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl FeedConfig {
    /// Creates a feed config with default endpoint, area and limits
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: EIA_BASE_URL.to_string(),
            area: Some(DEFAULT_AREA.to_string()),
            page_length: DEFAULT_PAGE_LENGTH,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Points the feed at a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// The credential stays out of logs and panic messages.
impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("area", &self.area)
            .field("page_length", &self.page_length)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// What the cache does when a refresh fails while a stale snapshot is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Surface the upstream error to the caller
    #[default]
    FailFast,
    /// Return the stale snapshot and log a warning
    ServeStale,
}

/// Settings for the in-memory price cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age at which a snapshot is still served without refetching
    pub ttl: Duration,
    /// Upper bound on a refresh, independent of the feed implementation
    pub fetch_timeout: Duration,
    /// Behaviour on refresh failure
    pub stale_policy: StalePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_REQUEST_TIMEOUT,
            stale_policy: StalePolicy::FailFast,
        }
    }
}

/// Everything needed to build a [`crate::service::PriceService`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub feed: FeedConfig,
    pub cache: CacheConfig,
}

impl ServiceConfig {
    /// Creates a config with default settings for the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            feed: FeedConfig::new(api_key),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(1800));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.stale_policy, StalePolicy::FailFast);
    }

    #[test]
    fn test_feed_config_defaults() {
        let config = FeedConfig::new("key");
        assert_eq!(config.base_url, EIA_BASE_URL);
        assert_eq!(config.area.as_deref(), Some("NUS"));
        assert_eq!(config.page_length, 5000);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_feed_config_debug_redacts_api_key() {
        let config = FeedConfig::new("super-secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_with_base_url() {
        let config = FeedConfig::new("key").with_base_url("http://127.0.0.1:9999/data");
        assert_eq!(config.base_url, "http://127.0.0.1:9999/data");
    }
}
