//! Integration tests for the enrichment pipeline
//!
//! The search collaborator is mocked so every lookup the pipeline issues is
//! visible to the test.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CanonicalIdResolver, Provider, QuotaMonitor, QuotaStatus, SearchOptions,
    TrackRecord, TrackSearch,
};
use core_metadata::validation::{dedup_key, is_complete};
use core_metadata::{CompletionRequest, EnrichmentConfig, EnrichmentPipeline};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub Search {}

    #[async_trait]
    impl TrackSearch for Search {
        async fn search_tracks(
            &self,
            query: &str,
            limit: usize,
            options: SearchOptions,
        ) -> BridgeResult<Vec<TrackRecord>>;
    }
}

fn track(id: &str, title: &str, artist: &str, cover: &str) -> TrackRecord {
    TrackRecord::new(id)
        .with_title(title)
        .with_artist(artist)
        .with_cover_url(cover)
}

fn pipeline(search: MockSearch) -> EnrichmentPipeline {
    EnrichmentPipeline::new(EnrichmentConfig::default(), Arc::new(search))
}

#[tokio::test]
async fn test_scenario_incomplete_record_enriched_complete_record_unchanged() {
    let mut search = MockSearch::new();
    search.expect_search_tracks().returning(|query, _, _| {
        if query == "Song A" {
            Ok(vec![track("a-hit", "Song A", "Artist A", "https://img/a.jpg")])
        } else {
            Ok(Vec::new())
        }
    });

    let song_b = track("b", "Song B", "Artist B", "https://img/valid.jpg");
    let records = vec![track("a", "Song A", "", ""), song_b.clone()];

    let outcome = pipeline(search)
        .run(records, CompletionRequest::default())
        .await;

    assert!(outcome.records.contains(&song_b));
    for record in &outcome.records {
        let artist_empty = record.artist.as_deref().unwrap_or("").is_empty();
        let cover_empty = record.cover_url.as_deref().unwrap_or("").is_empty();
        assert!(!(artist_empty && cover_empty), "record {} left empty", record.id);
    }

    let song_a = outcome.records.iter().find(|r| r.id == "a").unwrap();
    assert_eq!(song_a.artist.as_deref(), Some("Artist A"));
    assert_eq!(song_a.cover_url.as_deref(), Some("https://img/a.jpg"));
    assert_eq!(outcome.report.titles_completed, 1);
}

#[tokio::test]
async fn test_complete_records_never_searched() {
    let mut search = MockSearch::new();
    search.expect_search_tracks().never();

    let records = vec![
        track("1", "One", "Band", "https://img/1.jpg").with_canonical_id(Provider::YouTube, "y1"),
        track("2", "Two", "Band", "https://img/2.jpg").with_canonical_id(Provider::Spotify, "s2"),
    ];

    let outcome = pipeline(search)
        .run(records.clone(), CompletionRequest::default())
        .await;

    assert_eq!(outcome.records, records);
    assert_eq!(outcome.report.already_complete, 2);
}

#[tokio::test]
async fn test_preferred_provider_is_passed_to_lookups() {
    let mut search = MockSearch::new();
    search
        .expect_search_tracks()
        .withf(|_, limit, options| {
            *limit == 1 && options.preferred_provider == Some(Provider::LastFm)
        })
        .times(1)
        .returning(|_, _, _| Ok(vec![track("x", "Song", "Found", "https://img/f.jpg")]));

    let records = vec![TrackRecord::new("1").with_title("Song")];
    let outcome = pipeline(search)
        .run(records, CompletionRequest::preferring(Some(Provider::LastFm)))
        .await;

    assert_eq!(outcome.records[0].artist.as_deref(), Some("Found"));
}

#[tokio::test]
async fn test_image_lookup_once_per_artist_group() {
    let mut search = MockSearch::new();
    search
        .expect_search_tracks()
        .withf(|query, _, _| query == "daft punk")
        .times(1)
        .returning(|_, _, _| Ok(vec![track("x", "Any", "Daft Punk", "https://img/dp.jpg")]));

    let records = vec![
        TrackRecord::new("1").with_title("One More Time").with_artist("Daft Punk"),
        TrackRecord::new("2").with_title("Digital Love").with_artist("daft punk"),
    ];

    let outcome = pipeline(search)
        .run(records, CompletionRequest::default())
        .await;

    assert_eq!(outcome.records.len(), 2);
    assert!(outcome
        .records
        .iter()
        .all(|r| r.cover_url.as_deref() == Some("https://img/dp.jpg")));
    assert_eq!(outcome.report.images_completed, 2);
}

#[tokio::test]
async fn test_placeholder_group_image_falls_back_per_record() {
    let mut search = MockSearch::new();
    search.expect_search_tracks().returning(|query, _, options| {
        match (query, options.preferred_provider) {
            ("artist", _) => Ok(vec![track("g", "x", "Artist", "https://cdn/placeholder.png")]),
            ("Song Artist", Some(Provider::Spotify)) => Ok(Vec::new()),
            ("Song", None) => Ok(vec![track("s", "Song", "Artist", "https://img/song.jpg")]),
            _ => Ok(Vec::new()),
        }
    });

    let records = vec![TrackRecord::new("1").with_title("Song").with_artist("Artist")];
    let outcome = pipeline(search)
        .run(records, CompletionRequest::preferring(Some(Provider::Spotify)))
        .await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(
        outcome.records[0].cover_url.as_deref(),
        Some("https://img/song.jpg")
    );
}

#[tokio::test]
async fn test_irreparable_records_replaced_without_duplicates() {
    let mut search = MockSearch::new();
    search
        .expect_search_tracks()
        .withf(|query, limit, _| query == "Artist X" && *limit == 6)
        .returning(|_, _, _| {
            Ok(vec![
                track("dup-key", "song 1", "artist x", "https://img/d.jpg"),
                track("dup-id", "Other", "Band", "https://img/o.jpg")
                    .with_canonical_id(Provider::YouTube, "yt-1"),
                track("placeholder", "New", "Band", "https://img/placeholder.jpg"),
                track("fresh-1", "Fresh One", "Band", "https://img/f1.jpg"),
                track("fresh-2", "Fresh Two", "Band", "https://img/f2.jpg"),
            ])
        });

    let existing = track("keep", "Song 1", "Artist X", "https://img/1.jpg")
        .with_canonical_id(Provider::YouTube, "yt-1");
    let records = vec![
        existing.clone(),
        TrackRecord::new("empty-1"),
        TrackRecord::new("empty-2"),
    ];

    let outcome = pipeline(search)
        .run(records, CompletionRequest::default())
        .await;

    assert_eq!(outcome.report.dropped, 2);
    assert_eq!(outcome.report.substituted, 2);

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["keep", "fresh-1", "fresh-2"]);

    let existing_key = dedup_key(&existing);
    for substitute in outcome.records.iter().filter(|r| r.id != "keep") {
        assert!(is_complete(substitute));
        assert_ne!(dedup_key(substitute), existing_key);
        assert_ne!(substitute.canonical_id(Provider::YouTube), Some("yt-1"));
    }
}

#[tokio::test]
async fn test_substitute_seeds_fall_through_to_popular_query() {
    let mut search = MockSearch::new();
    search.expect_search_tracks().returning(|query, _, _| match query {
        "top hits" => Ok(vec![track("hit", "Hit", "Star", "https://img/hit.jpg")]),
        _ => Err(BridgeError::OperationFailed("offline".to_string())),
    });

    let records = vec![TrackRecord::new("lost")];
    let outcome = pipeline(search)
        .run(records, CompletionRequest::default())
        .await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].id, "hit");
}

#[tokio::test]
async fn test_unfillable_slots_are_omitted() {
    let mut search = MockSearch::new();
    search
        .expect_search_tracks()
        .returning(|_, _, _| Err(BridgeError::Timeout("slow".to_string())));

    let records = vec![
        track("ok", "Fine", "Band", "https://img/ok.jpg"),
        TrackRecord::new("broken").with_title("Half"),
    ];
    let outcome = pipeline(search)
        .run(records, CompletionRequest::default())
        .await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].id, "ok");
    assert_eq!(outcome.report.dropped, 1);
    assert_eq!(outcome.report.substituted, 0);
}

// =============================================================================
// Canonical-ID backfill
// =============================================================================

struct FixedQuota(bool);

#[async_trait]
impl QuotaMonitor for FixedQuota {
    async fn quota_status(&self) -> BridgeResult<QuotaStatus> {
        Ok(QuotaStatus {
            has_quota: self.0,
            remaining: None,
        })
    }
}

#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl CanonicalIdResolver for CountingResolver {
    fn provider(&self) -> Provider {
        Provider::YouTube
    }

    async fn resolve(&self, record: &TrackRecord) -> BridgeResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("yt-{}", record.id)))
    }
}

fn backfill_records() -> Vec<TrackRecord> {
    vec![
        track("has-id", "A", "Band", "https://img/a.jpg").with_canonical_id(Provider::Spotify, "s"),
        track("no-id", "B", "Band", "https://img/b.jpg"),
    ]
}

#[tokio::test]
async fn test_backfill_runs_when_quota_available() {
    let mut search = MockSearch::new();
    search.expect_search_tracks().never();
    let resolver = Arc::new(CountingResolver::default());

    let outcome = pipeline(search)
        .with_canonical_id_backfill(Arc::new(FixedQuota(true)), resolver.clone())
        .run(backfill_records(), CompletionRequest::default())
        .await;

    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.report.ids_backfilled, 1);

    let no_id = outcome.records.iter().find(|r| r.id == "no-id").unwrap();
    assert_eq!(no_id.canonical_id(Provider::YouTube), Some("yt-no-id"));
    let has_id = outcome.records.iter().find(|r| r.id == "has-id").unwrap();
    assert_eq!(has_id.canonical_id(Provider::YouTube), None);
}

#[tokio::test]
async fn test_backfill_skipped_without_quota() {
    let mut search = MockSearch::new();
    search.expect_search_tracks().never();
    let resolver = Arc::new(CountingResolver::default());

    let outcome = pipeline(search)
        .with_canonical_id_backfill(Arc::new(FixedQuota(false)), resolver.clone())
        .run(backfill_records(), CompletionRequest::default())
        .await;

    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.report.ids_backfilled, 0);
}
