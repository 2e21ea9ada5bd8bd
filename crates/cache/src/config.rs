//! Configuration for the cache engine.
//!
//! The single switch that enables or disables the cache backend is the
//! connection URI: when it is unset the engine runs in degraded,
//! authoritative-store-only mode with no code-path changes required by callers.

use serde::{Deserialize, Serialize};

/// Configuration for the object cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Document-store connection URI. `None` disables the cache backend.
    #[serde(default)]
    pub uri: Option<String>,

    /// Database holding the cache collections.
    #[serde(default = "default_database")]
    pub database: String,

    /// Page size applied when a query does not specify `_limit`.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
}

fn default_database() -> String {
    "portico".to_string()
}

fn default_limit() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            uri: None,
            database: default_database(),
            default_limit: default_limit(),
        }
    }
}

impl CacheConfig {
    /// Loads configuration from `PORTICO_CACHE_*` environment variables.
    ///
    /// Unset variables fall back to their defaults; in particular an unset
    /// `PORTICO_CACHE_URL` selects degraded mode.
    pub fn from_env() -> Self {
        Self {
            uri: std::env::var("PORTICO_CACHE_URL").ok().filter(|s| !s.is_empty()),
            database: std::env::var("PORTICO_CACHE_DATABASE")
                .unwrap_or_else(|_| default_database()),
            default_limit: std::env::var("PORTICO_CACHE_DEFAULT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_limit),
        }
    }

    /// Returns true when a cache backend is configured.
    pub fn cache_enabled(&self) -> bool {
        self.uri.is_some()
    }
}
