//! # Provider Health Tracker
//!
//! Per-provider success/error bookkeeping that turns repeated failures into a
//! provider ordering.
//!
//! ## Rules
//!
//! - Every error increments `error_count`. Once it exceeds the configured
//!   threshold the provider is marked unavailable.
//! - Every success marks the provider available and decrements `error_count`
//!   by one (never below zero).
//! - When no provider is available, [`ProviderHealthTracker::best_provider`]
//!   resets all of them and returns the top-ranked one.
//!   [`ProviderHealthTracker::ordered_among`] applies the same reset when
//!   none of a caller's candidates is available.
//!
//! There is no timer-based recovery. The table is checkpointed into the
//! [`AdaptiveCache`] after every change and can be loaded back with
//! [`ProviderHealthTracker::restore`].

use crate::error::{MetadataError, Result};
use bridge_traits::time::Clock;
use bridge_traits::Provider;
use chrono::{DateTime, Utc};
use core_cache::{AdaptiveCache, CacheCategory};
use core_runtime::events::{EngineEvent, EventBus, ProviderEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Cache key under which the status table is checkpointed.
pub fn status_cache_key() -> String {
    CacheCategory::ProviderStatus.key("table")
}

/// Health tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// A provider is disabled once its error count exceeds this (default: 5)
    pub error_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { error_threshold: 5 }
    }
}

impl HealthConfig {
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.error_threshold == 0 {
            return Err(MetadataError::InvalidConfig(
                "error_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Health of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub available: bool,
    pub error_count: u32,
    pub success_count: u64,
    pub last_error: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Static rank, lower is better
    pub priority: u8,
}

impl ProviderStatus {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            available: true,
            error_count: 0,
            success_count: 0,
            last_error: None,
            last_success: None,
            last_attempt: None,
            priority: provider.priority_rank(),
        }
    }
}

/// Tracks provider availability and checkpoints it into the cache.
pub struct ProviderHealthTracker {
    config: HealthConfig,
    clock: Arc<dyn Clock>,
    cache: Arc<AdaptiveCache>,
    event_bus: Option<EventBus>,
    statuses: Mutex<BTreeMap<Provider, ProviderStatus>>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl ProviderHealthTracker {
    pub fn new(config: HealthConfig, cache: Arc<AdaptiveCache>, clock: Arc<dyn Clock>) -> Self {
        let statuses = Provider::ALL
            .iter()
            .map(|p| (*p, ProviderStatus::new(*p)))
            .collect();

        Self {
            config,
            clock,
            cache,
            event_bus: None,
            statuses: Mutex::new(statuses),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Publish availability transitions on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn statuses(&self) -> MutexGuard<'_, BTreeMap<Provider, ProviderStatus>> {
        self.statuses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ProviderEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(EngineEvent::Provider(event)).ok();
        }
    }

    /// Records a successful call.
    pub async fn register_success(&self, provider: Provider) {
        let now = self.clock.now();
        let recovered = {
            let mut statuses = self.statuses();
            let status = statuses
                .entry(provider)
                .or_insert_with(|| ProviderStatus::new(provider));
            let was_available = status.available;

            status.available = true;
            status.success_count += 1;
            status.error_count = status.error_count.saturating_sub(1);
            status.last_success = Some(now);
            status.last_attempt = Some(now);
            !was_available
        };

        if recovered {
            info!(provider = %provider, "Provider available again");
            self.emit(ProviderEvent::Recovered { provider });
        }

        self.persist().await;
    }

    /// Records a failed call.
    pub async fn register_error(&self, provider: Provider) {
        let now = self.clock.now();
        let disabled = {
            let mut statuses = self.statuses();
            let status = statuses
                .entry(provider)
                .or_insert_with(|| ProviderStatus::new(provider));

            status.error_count += 1;
            status.last_error = Some(now);
            status.last_attempt = Some(now);

            if status.available && status.error_count > self.config.error_threshold {
                status.available = false;
                Some(status.error_count)
            } else {
                None
            }
        };

        if let Some(error_count) = disabled {
            warn!(
                provider = %provider,
                error_count,
                "Provider disabled after repeated errors"
            );
            self.emit(ProviderEvent::Disabled {
                provider,
                error_count,
            });
        }

        self.persist().await;
    }

    /// Best available provider by static rank.
    ///
    /// If every provider is disabled, all are reset to available and the
    /// top-ranked provider is returned.
    pub async fn best_provider(&self) -> Provider {
        self.ordered_providers()
            .await
            .first()
            .copied()
            .unwrap_or(Provider::ALL[0])
    }

    /// Available providers, best rank first.
    ///
    /// Applies the same reset as [`best_provider`](Self::best_provider) when
    /// none are available, so the result is never empty.
    pub async fn ordered_providers(&self) -> Vec<Provider> {
        self.ordered_among(&Provider::ALL).await
    }

    /// Available providers out of `candidates`, best rank first.
    ///
    /// When none of `candidates` is available every provider is reset, so a
    /// caller that only has clients for some providers still gets them back.
    pub async fn ordered_among(&self, candidates: &[Provider]) -> Vec<Provider> {
        let available = self.available_providers(candidates);
        if !available.is_empty() || candidates.is_empty() {
            return available;
        }

        self.reset_all().await;
        self.available_providers(candidates)
    }

    fn available_providers(&self, candidates: &[Provider]) -> Vec<Provider> {
        let mut available: Vec<(u8, Provider)> = self
            .statuses()
            .values()
            .filter(|s| s.available && candidates.contains(&s.provider))
            .map(|s| (s.priority, s.provider))
            .collect();
        available.sort();
        available.into_iter().map(|(_, provider)| provider).collect()
    }

    async fn reset_all(&self) {
        {
            let mut statuses = self.statuses();
            for status in statuses.values_mut() {
                status.available = true;
                status.error_count = 0;
            }
        }

        warn!("No provider available, resetting all providers");
        self.emit(ProviderEvent::Reset);
        self.persist().await;
    }

    pub fn is_available(&self, provider: Provider) -> bool {
        self.statuses()
            .get(&provider)
            .map(|s| s.available)
            .unwrap_or(false)
    }

    pub fn status(&self, provider: Provider) -> Option<ProviderStatus> {
        self.statuses().get(&provider).cloned()
    }

    /// Snapshot of every provider's status, best rank first.
    pub fn get_all_status(&self) -> Vec<ProviderStatus> {
        let mut all: Vec<ProviderStatus> = self.statuses().values().cloned().collect();
        all.sort_by_key(|s| s.priority);
        all
    }

    /// Loads a checkpointed table from the cache.
    ///
    /// Returns `Ok(false)` when nothing was stored. Calls made before this
    /// completes operate on the default table.
    pub async fn restore(&self) -> Result<bool> {
        let stored: Option<Vec<ProviderStatus>> =
            self.cache.get_json(&status_cache_key(), false).await?;

        let Some(stored) = stored else {
            debug!("No provider status checkpoint found");
            return Ok(false);
        };

        let mut statuses = self.statuses();
        for mut status in stored {
            status.priority = status.provider.priority_rank();
            statuses.insert(status.provider, status);
        }

        info!(providers = statuses.len(), "Restored provider status");
        Ok(true)
    }

    async fn persist(&self) {
        // Snapshot and write under one lock so checkpoints land in order.
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.get_all_status();
        if let Err(e) = self
            .cache
            .set_json(&status_cache_key(), &snapshot, CacheCategory::ProviderStatus)
            .await
        {
            warn!(error = %e, "Failed to checkpoint provider status");
        }
    }
}
