//! Cache configuration.
//!
//! The configuration store is owned by the host; this crate only consumes a
//! [`CacheConfig`] value. Defaults match a single-bid, 10 ms debounce setup.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables consumed by the batcher, store orchestrator and local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Cache endpoint, also the base of retrieval URLs
    pub url: String,

    /// Request timeout for store calls and ad-server fetches
    pub timeout_ms: u64,

    /// Include bidder, bid id and auction id in store payloads
    pub vast_track: bool,

    /// Maximum bids per store call
    pub batch_size: usize,

    /// Debounce delay before a flush
    pub batch_timeout_ms: u64,

    /// Keep VAST in process instead of the remote store
    pub use_local: bool,

    /// Re-store bids that already carry a bidder-assigned cache key
    pub ignore_bidder_cache_key: bool,

    /// Prefix of the placeholder URL an ad-server wrapper carries for local VAST
    pub local_placeholder_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            url: String::new(),
            timeout_ms: 1000,
            vast_track: false,
            batch_size: 1,
            batch_timeout_ms: 10,
            use_local: false,
            ignore_bidder_cache_key: false,
            local_placeholder_prefix: "https://video-cache.invalid/local".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load config from `VIDEO_CACHE_*` environment variables over defaults.
    pub fn from_env() -> Result<Self, CacheError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: CacheConfig =
            serde_json::from_str(json).map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, CacheError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CacheConfig::default();

        if let Some(url) = lookup("VIDEO_CACHE_URL") {
            config.url = url;
        }
        if let Some(v) = lookup("VIDEO_CACHE_TIMEOUT_MS") {
            config.timeout_ms = parse_var("VIDEO_CACHE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("VIDEO_CACHE_VAST_TRACK") {
            config.vast_track = parse_var("VIDEO_CACHE_VAST_TRACK", &v)?;
        }
        if let Some(v) = lookup("VIDEO_CACHE_BATCH_SIZE") {
            config.batch_size = parse_var("VIDEO_CACHE_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("VIDEO_CACHE_BATCH_TIMEOUT_MS") {
            config.batch_timeout_ms = parse_var("VIDEO_CACHE_BATCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("VIDEO_CACHE_USE_LOCAL") {
            config.use_local = parse_var("VIDEO_CACHE_USE_LOCAL", &v)?;
        }
        if let Some(v) = lookup("VIDEO_CACHE_IGNORE_BIDDER_CACHE_KEY") {
            config.ignore_bidder_cache_key = parse_var("VIDEO_CACHE_IGNORE_BIDDER_CACHE_KEY", &v)?;
        }
        if let Some(prefix) = lookup("VIDEO_CACHE_LOCAL_PLACEHOLDER_PREFIX") {
            config.local_placeholder_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configs the engine cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.batch_size == 0 {
            return Err(CacheError::Config("batchSize must be at least 1".to_string()));
        }
        if !self.use_local && self.url.is_empty() {
            return Err(CacheError::Config(
                "url is required unless useLocal is set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CacheError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CacheError::Config(format!("{}={:?}: {}", key, value, e)))
}
