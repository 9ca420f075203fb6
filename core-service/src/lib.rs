//! Completion engine façade and bootstrap helpers.
//!
//! This crate wires host-provided collaborators (clock, cache backing store,
//! provider clients, quota monitor, canonical-ID resolver) into the adaptive
//! cache, provider health tracker, enrichment pipeline and priority
//! scheduler, and exposes the small surface host applications call.
//!
//! ```ignore
//! use core_service::{CompletionEngine, EngineDependencies};
//! use core_service::config::EngineConfig;
//! use core_scheduler::LoadOptions;
//!
//! let deps = EngineDependencies::new()
//!     .with_provider_client(spotify)
//!     .with_provider_client(youtube);
//! let engine = CompletionEngine::new(EngineConfig::default(), deps)?;
//! engine.start().await;
//!
//! engine.set_priority("home", "forYou");
//! engine.enqueue_load(records, LoadOptions::new("home", "forYou"), |completed| {
//!     render(completed);
//! });
//! ```

pub mod config;
pub mod error;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{CoreError, Result};

use bridge_traits::time::{Clock, SystemClock};
use bridge_traits::{
    CanonicalIdResolver, Provider, ProviderClient, QuotaMonitor, TrackRecord, TrackSearch,
};
use core_cache::{AdaptiveCache, CacheStats, CacheStore, MemoryCacheStore};
use core_metadata::{
    EnrichmentPipeline, MultiProviderSearch, ProviderHealthTracker, ProviderStatus,
};
use core_runtime::events::{EngineEvent, EventBus, Receiver};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_scheduler::{
    provider_distribution, JobId, JobSummary, LoadOptions, PriorityContext, PriorityScheduler,
    ProviderDistribution, SchedulerStats,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Aggregated handle to every collaborator the engine consumes.
///
/// Defaults: system clock, in-memory cache store, no provider clients, no
/// canonical-ID backfill, logging left to the host.
pub struct EngineDependencies {
    pub clock: Arc<dyn Clock>,
    pub cache_store: Arc<dyn CacheStore>,
    pub provider_clients: Vec<Arc<dyn ProviderClient>>,
    /// Replaces the built-in multi-provider routing when set
    pub search: Option<Arc<dyn TrackSearch>>,
    pub quota_monitor: Option<Arc<dyn QuotaMonitor>>,
    pub id_resolver: Option<Arc<dyn CanonicalIdResolver>>,
    pub logging: Option<LoggingConfig>,
}

impl Default for EngineDependencies {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            cache_store: Arc::new(MemoryCacheStore::new()),
            provider_clients: Vec::new(),
            search: None,
            quota_monitor: None,
            id_resolver: None,
            logging: None,
        }
    }
}

impl EngineDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = store;
        self
    }

    pub fn with_provider_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.provider_clients.push(client);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn TrackSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Enables canonical-ID backfill through `resolver`, gated by `quota`.
    pub fn with_canonical_id_backfill(
        mut self,
        quota: Arc<dyn QuotaMonitor>,
        resolver: Arc<dyn CanonicalIdResolver>,
    ) -> Self {
        self.quota_monitor = Some(quota);
        self.id_resolver = Some(resolver);
        self
    }

    /// Initializes `tracing` when the engine is built.
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }
}

impl fmt::Debug for EngineDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<Provider> = self.provider_clients.iter().map(|c| c.provider()).collect();
        f.debug_struct("EngineDependencies")
            .field("provider_clients", &providers)
            .field("custom_search", &self.search.is_some())
            .field("backfill", &self.id_resolver.is_some())
            .field("logging", &self.logging)
            .finish()
    }
}

/// Point-in-time view of the engine for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub scheduler: SchedulerStats,
    pub cache: CacheStats,
    pub providers: Vec<ProviderStatus>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CompletionEngine {
    config: Arc<EngineConfig>,
    cache: Arc<AdaptiveCache>,
    health: Arc<ProviderHealthTracker>,
    scheduler: PriorityScheduler,
    event_bus: EventBus,
}

impl CompletionEngine {
    /// Validates `config` and wires every component. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(config: EngineConfig, deps: EngineDependencies) -> Result<Self> {
        config.validate()?;

        if let Some(logging) = deps.logging.clone() {
            if let Err(e) = init_logging(logging) {
                // Another subscriber already owns the process.
                warn!(error = %e, "Logging not initialized by engine");
            }
        }

        if deps.search.is_none() && deps.provider_clients.is_empty() {
            return Err(CoreError::InitializationFailed(
                "at least one provider client or a search collaborator is required".to_string(),
            ));
        }

        let event_bus = EventBus::new(config.event_buffer);

        let cache = Arc::new(AdaptiveCache::new(
            config.cache.clone(),
            deps.cache_store,
            Arc::clone(&deps.clock),
        )?);

        let health = Arc::new(
            ProviderHealthTracker::new(config.health.clone(), Arc::clone(&cache), deps.clock)
                .with_event_bus(event_bus.clone()),
        );

        let search: Arc<dyn TrackSearch> = match deps.search {
            Some(search) => search,
            None => {
                let routed = deps.provider_clients.into_iter().fold(
                    MultiProviderSearch::new(
                        config.provider_calls.clone(),
                        Arc::clone(&health),
                        Arc::clone(&cache),
                    ),
                    |search, client| search.with_client(client),
                );
                info!(providers = ?routed.providers(), "Provider routing configured");
                Arc::new(routed)
            }
        };

        let mut pipeline = EnrichmentPipeline::new(config.enrichment.clone(), search);
        match (deps.quota_monitor, deps.id_resolver) {
            (Some(quota), Some(resolver)) => {
                info!(provider = %resolver.provider(), "Canonical-ID backfill enabled");
                pipeline = pipeline.with_canonical_id_backfill(quota, resolver);
            }
            (None, None) => {}
            _ => warn!("Canonical-ID backfill needs both a quota monitor and a resolver, disabled"),
        }

        let scheduler = PriorityScheduler::new(
            config.scheduler.clone(),
            config.weights.clone(),
            Arc::new(pipeline),
        )?
        .with_event_bus(event_bus.clone());

        Ok(Self {
            config: Arc::new(config),
            cache,
            health,
            scheduler,
            event_bus,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Restores persisted provider health, then starts the scheduler.
    ///
    /// Jobs enqueued before this call wait in the queue.
    pub async fn start(&self) {
        match self.health.restore().await {
            Ok(true) => info!("Provider health restored"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not restore provider health, starting fresh"),
        }
        self.scheduler.start();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Tells the scheduler what the user is looking at.
    pub fn set_priority(&self, page: impl Into<String>, section: impl Into<String>) {
        self.scheduler.set_priority(page, section);
    }

    pub fn priority_context(&self) -> PriorityContext {
        self.scheduler.priority_context()
    }

    /// Queues `records` for completion. `on_complete` is invoked exactly once.
    pub fn enqueue_load<F>(
        &self,
        records: Vec<TrackRecord>,
        options: LoadOptions,
        on_complete: F,
    ) -> JobId
    where
        F: FnOnce(Vec<TrackRecord>) + Send + 'static,
    {
        self.scheduler.enqueue_load(records, options, on_complete)
    }

    pub fn enqueue_load_async(
        &self,
        records: Vec<TrackRecord>,
        options: LoadOptions,
    ) -> oneshot::Receiver<Vec<TrackRecord>> {
        self.scheduler.enqueue_load_async(records, options)
    }

    pub fn provider_distribution(&self, section: &str) -> ProviderDistribution {
        provider_distribution(section)
    }

    pub fn cache(&self) -> &Arc<AdaptiveCache> {
        &self.cache
    }

    pub fn health(&self) -> &Arc<ProviderHealthTracker> {
        &self.health
    }

    pub fn queued_jobs(&self) -> Vec<JobSummary> {
        self.scheduler.queued_jobs()
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.event_bus.subscribe()
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            scheduler: self.scheduler.stats(),
            cache: self.cache.stats().await?,
            providers: self.health.get_all_status(),
        })
    }

    /// Stops the scheduler. Queued jobs receive their original records and
    /// running jobs are awaited.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("Completion engine stopped");
    }
}
