//! Multi-provider search with health-aware fallback
//!
//! ## Call order
//!
//! 1. The preferred provider, if one was requested and it is available
//! 2. The remaining providers in the health tracker's order
//!
//! Each call is bounded by `call_timeout`. A failure or timeout is recorded
//! against the provider and the next one is tried; an empty result also moves
//! on but counts as a success. The first non-empty result is cached under
//! [`CacheCategory::Search`] and returned.

use crate::error::{MetadataError, Result};
use crate::health::ProviderHealthTracker;
use crate::validation::normalize;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, Provider, ProviderClient, SearchOptions, TrackRecord, TrackSearch};
use core_cache::{AdaptiveCache, CacheCategory};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Per-call limits for provider requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallConfig {
    /// Upper bound on a single provider call (default: 12s)
    pub call_timeout: Duration,
}

impl Default for ProviderCallConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(12),
        }
    }
}

impl ProviderCallConfig {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.call_timeout.is_zero() {
            return Err(MetadataError::InvalidConfig(
                "call_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// [`TrackSearch`] over a set of provider clients.
pub struct MultiProviderSearch {
    clients: BTreeMap<Provider, Arc<dyn ProviderClient>>,
    health: Arc<ProviderHealthTracker>,
    cache: Arc<AdaptiveCache>,
    config: ProviderCallConfig,
}

impl MultiProviderSearch {
    pub fn new(
        config: ProviderCallConfig,
        health: Arc<ProviderHealthTracker>,
        cache: Arc<AdaptiveCache>,
    ) -> Self {
        Self {
            clients: BTreeMap::new(),
            health,
            cache,
            config,
        }
    }

    /// Registers a client, replacing any previous client for its provider.
    pub fn with_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    /// Providers with a registered client.
    pub fn providers(&self) -> Vec<Provider> {
        self.clients.keys().copied().collect()
    }

    fn cache_key(query: &str, limit: usize, preferred: Option<Provider>) -> String {
        let scope = preferred.map(|p| p.as_str()).unwrap_or("any");
        CacheCategory::Search.key(format!("{}:{}:{}", scope, limit, normalize(query)))
    }

    async fn call_order(&self, preferred: Option<Provider>) -> Vec<Provider> {
        let mut order = Vec::with_capacity(self.clients.len());

        if let Some(provider) = preferred {
            if self.health.is_available(provider) && self.clients.contains_key(&provider) {
                order.push(provider);
            }
        }

        let registered = self.providers();
        for provider in self.health.ordered_among(&registered).await {
            if self.clients.contains_key(&provider) && !order.contains(&provider) {
                order.push(provider);
            }
        }

        order
    }

    #[instrument(skip(self, client), fields(provider = %client.provider()))]
    async fn call_provider(
        &self,
        client: &Arc<dyn ProviderClient>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackRecord>> {
        let provider = client.provider();

        match tokio::time::timeout(self.config.call_timeout, client.search(query, limit)).await {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(e)) => Err(MetadataError::from_provider(provider, e)),
            Err(_) => Err(MetadataError::Timeout {
                provider,
                timeout_ms: self.config.call_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl TrackSearch for MultiProviderSearch {
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        options: SearchOptions,
    ) -> BridgeResult<Vec<TrackRecord>> {
        let key = Self::cache_key(query, limit, options.preferred_provider);

        if !options.force_fresh {
            match self.cache.get_json::<Vec<TrackRecord>>(&key, false).await {
                Ok(Some(cached)) => {
                    debug!(query = %query, "Search served from cache");
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ignoring unreadable cached search"),
            }
        }

        let mut any_success = false;
        let mut last_error: Option<MetadataError> = None;

        for provider in self.call_order(options.preferred_provider).await {
            let Some(client) = self.clients.get(&provider) else {
                continue;
            };

            match self.call_provider(client, query, limit).await {
                Ok(results) => {
                    self.health.register_success(provider).await;
                    any_success = true;

                    if results.is_empty() {
                        debug!(provider = %provider, query = %query, "No results, trying next provider");
                        continue;
                    }

                    if let Err(e) = self.cache.set_json(&key, &results, CacheCategory::Search).await
                    {
                        warn!(error = %e, "Failed to cache search results");
                    }
                    return Ok(results);
                }
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Provider search failed");
                    self.health.register_error(provider).await;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_success => Err(e.into()),
            _ if any_success => Ok(Vec::new()),
            _ => Err(BridgeError::NotAvailable(
                "No provider client registered".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_normalized() {
        assert_eq!(
            MultiProviderSearch::cache_key("  Daft   PUNK ", 5, Some(Provider::Spotify)),
            "search:spotify:5:daft punk"
        );
        assert_eq!(
            MultiProviderSearch::cache_key("x", 1, None),
            "search:any:1:x"
        );
    }

    #[test]
    fn test_call_config_validation() {
        assert!(ProviderCallConfig::default().validate().is_ok());
        assert!(ProviderCallConfig::default()
            .with_call_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
