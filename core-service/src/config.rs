//! Engine-wide configuration
//!
//! Aggregates the configuration of every component behind one builder and
//! validates the groups against each other.
//!
//! ```ignore
//! use core_service::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .max_concurrent_jobs(3)
//!     .job_timeout(Duration::from_secs(20))
//!     .provider_call_timeout(Duration::from_secs(10))
//!     .build()?;
//! ```

use crate::error::{CoreError, Result};
use core_cache::{CacheCategory, CacheConfig};
use core_metadata::{EnrichmentConfig, HealthConfig, ProviderCallConfig};
use core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE;
use core_scheduler::{PriorityWeights, SchedulerConfig};
use std::time::Duration;

/// Validated configuration for a [`CompletionEngine`](crate::CompletionEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub health: HealthConfig,
    pub provider_calls: ProviderCallConfig,
    pub enrichment: EnrichmentConfig,
    pub scheduler: SchedulerConfig,
    pub weights: PriorityWeights,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            health: HealthConfig::default(),
            provider_calls: ProviderCallConfig::default(),
            enrichment: EnrichmentConfig::default(),
            scheduler: SchedulerConfig::default(),
            weights: PriorityWeights::default(),
            event_buffer: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Checks every group, then the constraints between them.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.health.validate()?;
        self.provider_calls.validate()?;
        self.enrichment.validate()?;
        self.scheduler.validate()?;

        if self.provider_calls.call_timeout >= self.scheduler.job_timeout {
            return Err(CoreError::InvalidConfig(format!(
                "provider call timeout ({:?}) must be shorter than the job timeout ({:?})",
                self.provider_calls.call_timeout, self.scheduler.job_timeout
            )));
        }
        if self.event_buffer == 0 {
            return Err(CoreError::InvalidConfig(
                "event_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`EngineConfig`]. Unset values keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn health(mut self, health: HealthConfig) -> Self {
        self.config.health = health;
        self
    }

    pub fn provider_calls(mut self, provider_calls: ProviderCallConfig) -> Self {
        self.config.provider_calls = provider_calls;
        self
    }

    pub fn enrichment(mut self, enrichment: EnrichmentConfig) -> Self {
        self.config.enrichment = enrichment;
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn weights(mut self, weights: PriorityWeights) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn max_concurrent_jobs(mut self, max: usize) -> Self {
        self.config.scheduler = self.config.scheduler.with_max_concurrent_jobs(max);
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.scheduler = self.config.scheduler.with_job_timeout(timeout);
        self
    }

    pub fn provider_call_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_calls = self.config.provider_calls.with_call_timeout(timeout);
        self
    }

    pub fn error_threshold(mut self, threshold: u32) -> Self {
        self.config.health = self.config.health.with_error_threshold(threshold);
        self
    }

    pub fn max_cache_entries(mut self, max_entries: usize) -> Self {
        self.config.cache = self.config.cache.with_max_entries(max_entries);
        self
    }

    pub fn category_ttl(mut self, category: CacheCategory, ttl: Duration) -> Self {
        self.config.cache = self.config.cache.with_category_ttl(category, ttl);
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
