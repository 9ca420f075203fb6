//! Adaptive Cache
//!
//! Key/value cache with per-category time-to-live, a deterministic expiry
//! sweep and usage statistics.
//!
//! ## Expiry
//!
//! Every write resolves its [`CacheTtl`] to an absolute expiry using the
//! injected [`Clock`]. Reads never return an entry whose expiry has passed
//! unless the caller asks for stale data with `allow_expired`.
//!
//! ## Sweep
//!
//! After a write, the cache sweeps when `sweep_interval` has elapsed on the
//! clock since the previous sweep, or when the store holds more than
//! `max_entries`. A sweep drops every expired entry and then, if still over
//! the cap, the entries closest to expiry.
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_cache::{AdaptiveCache, CacheCategory};
//!
//! cache.set("albums:42", payload, CacheCategory::Albums).await?;
//! let hit = cache.get("albums:42", false).await?;
//! ```

use crate::config::{CacheConfig, CacheTtl};
use crate::error::{CacheError, Result};
use crate::stats::{CacheStats, DuplicateRequestDetector};
use crate::store::{CacheEntry, CacheStore, MemoryCacheStore};
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
}

#[derive(Debug)]
struct CacheState {
    stats: CacheStats,
    detector: DuplicateRequestDetector,
    last_sweep: DateTime<Utc>,
}

/// Category-aware cache over an injected [`CacheStore`].
pub struct AdaptiveCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl AdaptiveCache {
    /// Creates a cache over `store`, reading time from `clock`.
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let state = CacheState {
            stats: CacheStats::default(),
            detector: DuplicateRequestDetector::new(
                config.duplicate_window,
                config.duplicate_threshold,
            ),
            last_sweep: clock.now(),
        };

        Ok(Self {
            store,
            clock,
            config,
            state: Mutex::new(state),
        })
    }

    /// In-memory cache on the system clock.
    pub fn in_memory(config: CacheConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryCacheStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the value stored under `key`.
    ///
    /// Expired entries read as `None` unless `allow_expired` is set. Every
    /// `None` counts as a miss.
    pub async fn get(&self, key: &str, allow_expired: bool) -> Result<Option<String>> {
        let now = self.clock.now();

        {
            let mut state = self.state();
            if state.detector.record(key, now) {
                state.stats.duplicate_warnings += 1;
            }
        }

        let entry = self.store.get(key).await?;

        let mut state = self.state();
        match entry {
            Some(entry) if allow_expired || !entry.is_expired(now) => {
                state.stats.hits += 1;
                trace!(key = %key, "Cache hit");
                Ok(Some(entry.value))
            }
            _ => {
                state.stats.misses += 1;
                trace!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Stores `value` under `key` until the resolved TTL elapses.
    ///
    /// `ttl` is either a [`CacheCategory`](crate::CacheCategory), which uses the
    /// configured TTL of that category, or an explicit `Duration`.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<String>,
        ttl: impl Into<CacheTtl>,
    ) -> Result<()> {
        let now = self.clock.now();
        let expires_at = self.expiry_for(now, ttl.into())?;

        self.store
            .put(key, CacheEntry::new(value, expires_at))
            .await?;
        self.state().stats.writes += 1;

        self.maybe_sweep(now).await?;
        Ok(())
    }

    /// Removes `key`. Returns whether an entry existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.store.remove(key).await
    }

    /// Removes every entry and resets statistics.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        self.state().stats = CacheStats::default();
        Ok(())
    }

    /// Reads and deserializes a JSON payload.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        allow_expired: bool,
    ) -> Result<Option<T>> {
        match self.get(key, allow_expired).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CacheError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Serializes `value` as JSON and stores it.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: impl Into<CacheTtl>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set(key, raw, ttl).await
    }

    /// Drops expired entries, then the soonest-expiring ones above the cap.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let (expired, mut live): (Vec<_>, Vec<_>) = self
            .store
            .expiries()
            .await?
            .into_iter()
            .partition(|(_, expires_at)| now >= *expires_at);

        let mut report = SweepReport::default();
        for (key, _) in &expired {
            if self.store.remove(key).await? {
                report.expired += 1;
            }
        }

        let excess = live.len().saturating_sub(self.config.max_entries);
        if excess > 0 {
            live.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            for (key, _) in live.iter().take(excess) {
                if self.store.remove(key).await? {
                    report.evicted += 1;
                }
            }
        }

        {
            let mut state = self.state();
            state.stats.expired_removed += report.expired as u64;
            state.stats.capacity_evictions += report.evicted as u64;
            state.last_sweep = now;
            state.detector.prune(now);
        }

        debug!(
            expired = report.expired,
            evicted = report.evicted,
            remaining = live.len() - report.evicted,
            "Cache sweep finished"
        );

        Ok(report)
    }

    /// Current statistics, with `entries` read from the store.
    pub async fn stats(&self) -> Result<CacheStats> {
        let entries = self.store.len().await?;
        let mut stats = self.state().stats.clone();
        stats.entries = entries;
        Ok(stats)
    }

    fn expiry_for(&self, now: DateTime<Utc>, ttl: CacheTtl) -> Result<DateTime<Utc>> {
        let ttl = self.config.ttls.resolve(ttl);
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| CacheError::InvalidConfig(format!("TTL out of range: {:?}", ttl)))
    }

    async fn maybe_sweep(&self, now: DateTime<Utc>) -> Result<()> {
        let interval_elapsed = {
            let state = self.state();
            chrono::Duration::from_std(self.config.sweep_interval)
                .map(|interval| now - state.last_sweep >= interval)
                .unwrap_or(false)
        };

        if interval_elapsed || self.store.len().await? > self.config.max_entries {
            self.sweep().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheCategory;
    use bridge_traits::time::ManualClock;
    use std::time::Duration;

    fn cache_with_clock(config: CacheConfig) -> (AdaptiveCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = AdaptiveCache::new(
            config,
            Arc::new(MemoryCacheStore::new()),
            clock.clone(),
        )
        .unwrap();
        (cache, clock)
    }

    #[tokio::test]
    async fn test_get_counts_hits_and_misses() {
        let (cache, _) = cache_with_clock(CacheConfig::default());

        assert_eq!(cache.get("search:a", false).await.unwrap(), None);
        cache.set("search:a", "v", CacheCategory::Search).await.unwrap();
        assert_eq!(cache.get("search:a", false).await.unwrap().as_deref(), Some("v"));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (cache, _) = cache_with_clock(CacheConfig::default());
        cache.set("k", "v", Duration::from_secs(5)).await.unwrap();

        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k", true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let (cache, _) = cache_with_clock(CacheConfig::default());
        cache
            .set_json("tracks:ids", &vec![1u32, 2, 3], CacheCategory::Tracks)
            .await
            .unwrap();

        let ids: Option<Vec<u32>> = cache.get_json("tracks:ids", false).await.unwrap();
        assert_eq!(ids, Some(vec![1, 2, 3]));

        cache.set("tracks:bad", "{not json", CacheCategory::Tracks).await.unwrap();
        let bad: Result<Option<Vec<u32>>> = cache.get_json("tracks:bad", false).await;
        assert!(matches!(bad, Err(CacheError::Serialization { .. })));
    }

    #[tokio::test]
    async fn test_sweep_runs_after_interval() {
        let config = CacheConfig::default().with_sweep_interval(Duration::from_secs(60));
        let (cache, clock) = cache_with_clock(config);

        cache.set("a", "1", Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(61));
        cache.set("b", "2", Duration::from_secs(600)).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.expired_removed, 1);
        assert_eq!(stats.entries, 1);
    }
}
