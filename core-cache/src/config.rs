//! Cache configuration and TTL categories

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Kind of data stored under a cache key.
///
/// The category selects the time-to-live applied when a caller does not pass
/// an explicit one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Search,
    Recommendations,
    Genres,
    Artists,
    Playlists,
    Albums,
    Tracks,
    ProviderStatus,
    Default,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 9] = [
        CacheCategory::Search,
        CacheCategory::Recommendations,
        CacheCategory::Genres,
        CacheCategory::Artists,
        CacheCategory::Playlists,
        CacheCategory::Albums,
        CacheCategory::Tracks,
        CacheCategory::ProviderStatus,
        CacheCategory::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Recommendations => "recommendations",
            Self::Genres => "genres",
            Self::Artists => "artists",
            Self::Playlists => "playlists",
            Self::Albums => "albums",
            Self::Tracks => "tracks",
            Self::ProviderStatus => "provider_status",
            Self::Default => "default",
        }
    }

    /// Default time-to-live for the category.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(match self {
            Self::Search => 30 * MINUTE,
            Self::Recommendations => 2 * HOUR,
            Self::Genres => 12 * HOUR,
            Self::Artists => 6 * HOUR,
            Self::Playlists => 4 * HOUR,
            Self::Albums | Self::Tracks => 24 * HOUR,
            Self::ProviderStatus => 24 * HOUR,
            Self::Default => 4 * HOUR,
        })
    }

    /// Classifies a key by the segment before its first `:`.
    ///
    /// Only used for diagnostics; writes always name their category.
    pub fn from_key_prefix(key: &str) -> Self {
        let prefix = key.split(':').next().unwrap_or_default();
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == prefix)
            .unwrap_or(Self::Default)
    }

    /// Builds a key in this category's namespace.
    pub fn key(&self, suffix: impl fmt::Display) -> String {
        format!("{}:{}", self.as_str(), suffix)
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-to-live requested for a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Use the configured TTL of the category
    Category(CacheCategory),
    /// Use exactly this duration
    Explicit(Duration),
}

impl From<CacheCategory> for CacheTtl {
    fn from(category: CacheCategory) -> Self {
        CacheTtl::Category(category)
    }
}

impl From<Duration> for CacheTtl {
    fn from(duration: Duration) -> Self {
        CacheTtl::Explicit(duration)
    }
}

/// Category → TTL table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTtls {
    overrides: HashMap<CacheCategory, Duration>,
}

impl CategoryTtls {
    pub fn with(mut self, category: CacheCategory, ttl: Duration) -> Self {
        self.overrides.insert(category, ttl);
        self
    }

    pub fn get(&self, category: CacheCategory) -> Duration {
        self.overrides
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_ttl())
    }

    pub fn resolve(&self, ttl: CacheTtl) -> Duration {
        match ttl {
            CacheTtl::Category(category) => self.get(category),
            CacheTtl::Explicit(duration) => duration,
        }
    }
}

/// Configuration for the adaptive cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry count the sweep trims back to (default: 100)
    pub max_entries: usize,

    /// Minimum time between two expiry sweeps (default: 60s)
    pub sweep_interval: Duration,

    /// Rolling window for duplicate-request detection (default: 10s)
    pub duplicate_window: Duration,

    /// Reads of one key tolerated within the window before warning (default: 5)
    pub duplicate_threshold: usize,

    /// Per-category TTLs
    pub ttls: CategoryTtls,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            sweep_interval: Duration::from_secs(60),
            duplicate_window: Duration::from_secs(10),
            duplicate_threshold: 5,
            ttls: CategoryTtls::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry cap.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set duplicate-request detection parameters.
    pub fn with_duplicate_detection(mut self, window: Duration, threshold: usize) -> Self {
        self.duplicate_window = window;
        self.duplicate_threshold = threshold;
        self
    }

    /// Override one category's TTL.
    pub fn with_category_ttl(mut self, category: CacheCategory, ttl: Duration) -> Self {
        self.ttls = self.ttls.with(category, ttl);
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep_interval must be greater than 0".to_string(),
            ));
        }

        if self.duplicate_window.is_zero() {
            return Err(CacheError::InvalidConfig(
                "duplicate_window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
