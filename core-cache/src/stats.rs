//! Cache statistics and duplicate-request detection

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Counters describing cache behavior since creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that returned a value
    pub hits: u64,

    /// Reads that found nothing, or only an expired entry
    pub misses: u64,

    /// Successful writes
    pub writes: u64,

    /// Entries dropped by the sweep because they expired
    pub expired_removed: u64,

    /// Entries dropped by the sweep to get back under the cap
    pub capacity_evictions: u64,

    /// Times a key crossed the duplicate-read threshold
    pub duplicate_warnings: u64,

    /// Entries currently stored
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of reads that were hits, in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }

        self.hits as f64 / total as f64
    }
}

/// Flags keys read too often within a short window.
///
/// Repeated reads of one key usually mean a caller is polling instead of
/// waiting on an in-flight request. Detection only logs; it never blocks the
/// read.
#[derive(Debug)]
pub struct DuplicateRequestDetector {
    window: Duration,
    threshold: usize,
    seen: HashMap<String, VecDeque<DateTime<Utc>>>,
    last_prune: Option<DateTime<Utc>>,
}

impl DuplicateRequestDetector {
    pub fn new(window: std::time::Duration, threshold: usize) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::seconds(10)),
            threshold,
            seen: HashMap::new(),
            last_prune: None,
        }
    }

    /// Records a read of `key` at `now`.
    ///
    /// Returns `true` when the read pushed the key over the threshold.
    /// Idle keys are pruned at most once per window.
    pub fn record(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        if self.last_prune.map_or(true, |at| now - at >= self.window) {
            self.prune(now);
        }

        let cutoff = now - self.window;
        let timestamps = self.seen.entry(key.to_string()).or_default();

        while timestamps.front().is_some_and(|t| *t <= cutoff) {
            timestamps.pop_front();
        }
        timestamps.push_back(now);

        if timestamps.len() > self.threshold {
            warn!(
                key = %key,
                count = timestamps.len(),
                window_secs = self.window.num_seconds(),
                "Duplicate cache reads detected"
            );
            true
        } else {
            false
        }
    }

    /// Drops keys with no reads inside the window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        self.seen
            .retain(|_, timestamps| timestamps.back().is_some_and(|t| *t > cutoff));
        self.last_prune = Some(now);
    }

    pub fn tracked_keys(&self) -> usize {
        self.seen.len()
    }
}
