//! Integration tests for health-aware multi-provider search.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::ManualClock;
use bridge_traits::{BridgeError, Provider, ProviderClient, SearchOptions, TrackRecord, TrackSearch};
use core_cache::{AdaptiveCache, CacheConfig, MemoryCacheStore};
use core_metadata::{HealthConfig, MultiProviderSearch, ProviderCallConfig, ProviderHealthTracker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behavior {
    Found,
    Empty,
    Fail,
    Hang,
    /// Fails the first `n` calls, then finds results
    FailFirst(usize),
}

struct FakeClient {
    provider: Provider,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeClient {
    fn new(provider: Provider, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            provider,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn search(&self, query: &str, _limit: usize) -> BridgeResult<Vec<TrackRecord>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = match self.behavior {
            Behavior::FailFirst(n) if call < n => Behavior::Fail,
            Behavior::FailFirst(_) => Behavior::Found,
            other => other,
        };
        match behavior {
            Behavior::Found => Ok(vec![TrackRecord::new(format!("{}:{}", self.provider, query))
                .with_title(query)
                .with_artist("Artist")
                .with_source(self.provider)]),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Fail => Err(BridgeError::OperationFailed("HTTP 503".to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            Behavior::FailFirst(_) => unreachable!(),
        }
    }
}

struct Harness {
    health: Arc<ProviderHealthTracker>,
    search: MultiProviderSearch,
}

fn harness(clients: &[Arc<FakeClient>]) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let cache = Arc::new(
        AdaptiveCache::new(
            CacheConfig::default(),
            Arc::new(MemoryCacheStore::new()),
            clock.clone(),
        )
        .unwrap(),
    );
    let health = Arc::new(ProviderHealthTracker::new(
        HealthConfig::default(),
        cache.clone(),
        clock,
    ));

    let mut search = MultiProviderSearch::new(ProviderCallConfig::default(), health.clone(), cache);
    for client in clients {
        search = search.with_client(client.clone());
    }

    Harness { health, search }
}

#[tokio::test]
async fn test_best_ranked_provider_asked_first() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Found);
    let youtube = FakeClient::new(Provider::YouTube, Behavior::Found);
    let h = harness(&[spotify.clone(), youtube.clone()]);

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(results[0].source, Some(Provider::Spotify));
    assert_eq!(spotify.calls(), 1);
    assert_eq!(youtube.calls(), 0);
}

#[tokio::test]
async fn test_preferred_provider_asked_first() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Found);
    let lastfm = FakeClient::new(Provider::LastFm, Behavior::Found);
    let h = harness(&[spotify.clone(), lastfm.clone()]);

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::preferring(Some(Provider::LastFm)))
        .await
        .unwrap();

    assert_eq!(results[0].source, Some(Provider::LastFm));
    assert_eq!(spotify.calls(), 0);
}

#[tokio::test]
async fn test_failure_falls_through_and_is_recorded() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Fail);
    let youtube = FakeClient::new(Provider::YouTube, Behavior::Found);
    let h = harness(&[spotify.clone(), youtube.clone()]);

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(results[0].source, Some(Provider::YouTube));
    assert_eq!(h.health.status(Provider::Spotify).unwrap().error_count, 1);
    assert_eq!(h.health.status(Provider::YouTube).unwrap().success_count, 1);
}

#[tokio::test]
async fn test_empty_result_moves_to_next_provider() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Empty);
    let youtube = FakeClient::new(Provider::YouTube, Behavior::Found);
    let h = harness(&[spotify.clone(), youtube.clone()]);

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(results[0].source, Some(Provider::YouTube));
    assert_eq!(h.health.status(Provider::Spotify).unwrap().error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_provider_times_out() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Hang);
    let youtube = FakeClient::new(Provider::YouTube, Behavior::Found);
    let h = harness(&[spotify.clone(), youtube.clone()]);

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(results[0].source, Some(Provider::YouTube));
    assert_eq!(h.health.status(Provider::Spotify).unwrap().error_count, 1);
}

#[tokio::test]
async fn test_disabled_provider_skipped() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Found);
    let youtube = FakeClient::new(Provider::YouTube, Behavior::Found);
    let h = harness(&[spotify.clone(), youtube.clone()]);

    for _ in 0..6 {
        h.health.register_error(Provider::Spotify).await;
    }

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::preferring(Some(Provider::Spotify)))
        .await
        .unwrap();

    assert_eq!(results[0].source, Some(Provider::YouTube));
    assert_eq!(spotify.calls(), 0);
}

#[tokio::test]
async fn test_results_cached_unless_force_fresh() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Found);
    let h = harness(&[spotify.clone()]);

    h.search
        .search_tracks("song", 1, SearchOptions::default())
        .await
        .unwrap();
    h.search
        .search_tracks("  SONG ", 1, SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(spotify.calls(), 1);

    h.search
        .search_tracks("song", 1, SearchOptions::default().with_force_fresh(true))
        .await
        .unwrap();
    assert_eq!(spotify.calls(), 2);
}

#[tokio::test]
async fn test_all_providers_failing_is_an_error() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::Fail);
    let h = harness(&[spotify]);

    let result = h
        .search
        .search_tracks("song", 1, SearchOptions::default())
        .await;

    assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
}

#[tokio::test]
async fn test_sole_client_recovers_after_being_disabled() {
    let spotify = FakeClient::new(Provider::Spotify, Behavior::FailFirst(6));
    let h = harness(&[spotify.clone()]);

    for _ in 0..6 {
        let result = h
            .search
            .search_tracks("song", 1, SearchOptions::default().with_force_fresh(true))
            .await;
        assert!(result.is_err());
    }
    assert!(!h.health.is_available(Provider::Spotify));
    assert!(h.health.is_available(Provider::YouTube));

    let results = h
        .search
        .search_tracks("song", 1, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(spotify.calls(), 7);
    assert_eq!(results[0].source, Some(Provider::Spotify));
    assert!(h.health.is_available(Provider::Spotify));
}
