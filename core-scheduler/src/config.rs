//! Scheduler configuration

use crate::error::{Result, SchedulerError};
use std::collections::BTreeMap;
use std::time::Duration;

/// Section names the default weight table knows about.
pub mod sections {
    pub const FOR_YOU: &str = "forYou";
    pub const RECENTLY_PLAYED: &str = "recentlyPlayed";
    pub const TRENDING: &str = "trending";
    pub const NEW_RELEASES: &str = "newReleases";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const GENRES: &str = "genres";
    pub const SEARCH: &str = "search";
}

/// Configuration for the priority scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Jobs running at the same time (default: 5)
    pub max_concurrent_jobs: usize,

    /// Upper bound on one job's pipeline run (default: 30s)
    pub job_timeout: Duration,

    /// Jobs allowed to wait in the queue (default: 1000)
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            job_timeout: Duration::from_secs(30),
            queue_capacity: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent_jobs must be greater than 0".to_string(),
            ));
        }
        if self.job_timeout.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "job_timeout must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Constants of the priority score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityWeights {
    pub visible_base: i64,
    pub offscreen_base: i64,
    pub page_match_bonus: i64,
    pub section_match_bonus: i64,
    /// Static per-section weight; unknown sections weigh 0
    pub section_weights: BTreeMap<String, i64>,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        let section_weights = [
            (sections::FOR_YOU, 15),
            (sections::RECENTLY_PLAYED, 12),
            (sections::TRENDING, 10),
            (sections::NEW_RELEASES, 8),
            (sections::RECOMMENDATIONS, 6),
            (sections::GENRES, 4),
            (sections::SEARCH, 14),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        Self {
            visible_base: 50,
            offscreen_base: 20,
            page_match_bonus: 30,
            section_match_bonus: 20,
            section_weights,
        }
    }
}

impl PriorityWeights {
    pub fn with_section_weight(mut self, section: impl Into<String>, weight: i64) -> Self {
        self.section_weights.insert(section.into(), weight);
        self
    }

    pub fn section_weight(&self, section: &str) -> i64 {
        self.section_weights.get(section).copied().unwrap_or(0)
    }
}
