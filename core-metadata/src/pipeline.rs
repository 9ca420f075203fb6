//! # Enrichment Pipeline
//!
//! Completes one batch of track records.
//!
//! ## Stages
//!
//! ```text
//! classify ──> title/artist lookup ──> image lookup ──> canonical-ID backfill
//!                      │                    │
//!                      └──── irreparable ───┴──> substitute search
//! ```
//!
//! 1. **Classify** each record as complete, missing its image, or missing its
//!    title or artist.
//! 2. **Title/artist**: one single-result search per record, built from
//!    whatever the record already carries. Only missing fields are merged.
//! 3. **Image**: one search per artist group; records the group lookup
//!    cannot serve fall back to a `title artist` query, then to an unscoped
//!    title query.
//! 4. **Backfill**: when the quota monitor reports capacity, resolve the
//!    backfill provider's canonical ID for records that lack it.
//! 5. **Replace**: records still incomplete are dropped and the pipeline
//!    searches for as many substitutes, rejecting duplicates of records
//!    already in the batch.
//!
//! Lookup failures are absorbed: a record whose lookup fails simply stays
//! incomplete. The pipeline itself never fails.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{CompletionRequest, EnrichmentConfig, EnrichmentPipeline};
//!
//! let pipeline = EnrichmentPipeline::new(EnrichmentConfig::default(), search)
//!     .with_canonical_id_backfill(quota_monitor, resolver);
//!
//! let outcome = pipeline.run(records, CompletionRequest::default()).await;
//! ```

use crate::error::{MetadataError, Result};
use crate::validation::{
    build_query, classify, dedup_key, has_valid_title_artist, is_complete, is_valid_image,
    merge_missing, normalize, RecordIdentities, RecordStatus,
};
use async_trait::async_trait;
use bridge_traits::{
    CanonicalIdResolver, Provider, QuotaMonitor, SearchOptions, TrackRecord, TrackSearch,
};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Keywords recognized in artist names when seeding substitute searches.
const GENRE_KEYWORDS: &[&str] = &[
    "hip hop", "rap", "rock", "metal", "punk", "jazz", "blues", "soul", "funk", "reggae",
    "country", "folk", "indie", "pop", "house", "techno", "trance", "disco", "classical",
    "orchestra", "lofi", "edm",
];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the enrichment pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    /// Substitute search limit as a multiple of the slots to fill (default: 3)
    pub substitute_overfetch: usize,

    /// Query used when no seed can be derived from the batch (default: "top hits")
    pub popular_fallback_query: String,

    /// Lookups issued concurrently within one batch (default: 4)
    pub max_concurrent_lookups: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            substitute_overfetch: 3,
            popular_fallback_query: "top hits".to_string(),
            max_concurrent_lookups: 4,
        }
    }
}

impl EnrichmentConfig {
    pub fn with_substitute_overfetch(mut self, factor: usize) -> Self {
        self.substitute_overfetch = factor;
        self
    }

    pub fn with_popular_fallback_query(mut self, query: impl Into<String>) -> Self {
        self.popular_fallback_query = query.into();
        self
    }

    pub fn with_max_concurrent_lookups(mut self, max: usize) -> Self {
        self.max_concurrent_lookups = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.substitute_overfetch == 0 {
            return Err(MetadataError::InvalidConfig(
                "substitute_overfetch must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(MetadataError::InvalidConfig(
                "max_concurrent_lookups must be greater than 0".to_string(),
            ));
        }
        if self.popular_fallback_query.trim().is_empty() {
            return Err(MetadataError::InvalidConfig(
                "popular_fallback_query must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Completer seam
// =============================================================================

/// Per-job completion options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Provider to ask first
    pub preferred_provider: Option<Provider>,
}

impl CompletionRequest {
    pub fn preferring(provider: Option<Provider>) -> Self {
        Self {
            preferred_provider: provider,
        }
    }
}

/// Something that completes a batch of records.
///
/// The scheduler drives jobs through this trait so it can be tested without a
/// real pipeline.
#[async_trait]
pub trait RecordCompleter: Send + Sync {
    async fn complete(
        &self,
        records: Vec<TrackRecord>,
        request: CompletionRequest,
    ) -> Result<Vec<TrackRecord>>;
}

// =============================================================================
// Outcome
// =============================================================================

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub input: usize,
    pub already_complete: usize,
    pub titles_completed: usize,
    pub images_completed: usize,
    pub ids_backfilled: usize,
    pub dropped: usize,
    pub substituted: usize,
}

/// Records produced by a run, with its report.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub records: Vec<TrackRecord>,
    pub report: EnrichmentReport,
}

// =============================================================================
// Pipeline
// =============================================================================

struct Backfill {
    quota: Arc<dyn QuotaMonitor>,
    resolver: Arc<dyn CanonicalIdResolver>,
}

/// Completes records through an injected [`TrackSearch`].
pub struct EnrichmentPipeline {
    config: EnrichmentConfig,
    search: Arc<dyn TrackSearch>,
    backfill: Option<Backfill>,
}

impl EnrichmentPipeline {
    pub fn new(config: EnrichmentConfig, search: Arc<dyn TrackSearch>) -> Self {
        Self {
            config,
            search,
            backfill: None,
        }
    }

    /// Enable canonical-ID backfill, gated by `quota`.
    pub fn with_canonical_id_backfill(
        mut self,
        quota: Arc<dyn QuotaMonitor>,
        resolver: Arc<dyn CanonicalIdResolver>,
    ) -> Self {
        self.backfill = Some(Backfill { quota, resolver });
        self
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Runs every stage on `records`.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn run(
        &self,
        records: Vec<TrackRecord>,
        request: CompletionRequest,
    ) -> EnrichmentOutcome {
        let mut report = EnrichmentReport {
            input: records.len(),
            ..Default::default()
        };

        // Stage 1: classification
        let mut complete = Vec::new();
        let mut missing_image = Vec::new();
        let mut missing_text = Vec::new();
        for record in records {
            match classify(&record) {
                RecordStatus::Complete => complete.push(record),
                RecordStatus::MissingImage => missing_image.push(record),
                RecordStatus::MissingTitleOrArtist => missing_text.push(record),
            }
        }
        report.already_complete = complete.len();

        debug!(
            complete = complete.len(),
            missing_image = missing_image.len(),
            missing_text = missing_text.len(),
            "Classified records"
        );

        let mut completed = Vec::new();
        let mut irreparable = 0usize;

        // Stage 2: title/artist
        for record in self.complete_titles(missing_text, request).await {
            match classify(&record) {
                RecordStatus::Complete => {
                    report.titles_completed += 1;
                    completed.push(record);
                }
                RecordStatus::MissingImage => {
                    report.titles_completed += 1;
                    missing_image.push(record);
                }
                RecordStatus::MissingTitleOrArtist => irreparable += 1,
            }
        }

        // Stage 3: images
        for record in self.complete_images(missing_image, request).await {
            if is_complete(&record) {
                report.images_completed += 1;
                completed.push(record);
            } else {
                irreparable += 1;
            }
        }

        // Stage 4: canonical-ID backfill
        report.ids_backfilled = self
            .backfill_canonical_ids(&mut complete, &mut completed)
            .await;

        // Stage 5: replacement
        report.dropped = irreparable;
        let mut output = complete;
        output.extend(completed);

        if irreparable > 0 {
            let substitutes = self.find_substitutes(irreparable, &output, request).await;
            report.substituted = substitutes.len();
            output.extend(substitutes);
        }

        info!(
            input = report.input,
            output = output.len(),
            dropped = report.dropped,
            substituted = report.substituted,
            "Enrichment finished"
        );

        EnrichmentOutcome {
            records: output,
            report,
        }
    }

    async fn search_first(&self, query: &str, options: SearchOptions) -> Option<TrackRecord> {
        match self.search.search_tracks(query, 1, options).await {
            Ok(results) => results.into_iter().next(),
            Err(e) => {
                debug!(query = %query, error = %e, "Lookup failed");
                None
            }
        }
    }

    async fn complete_titles(
        &self,
        records: Vec<TrackRecord>,
        request: CompletionRequest,
    ) -> Vec<TrackRecord> {
        let options = SearchOptions::preferring(request.preferred_provider);

        stream::iter(records)
            .map(|mut record| async move {
                if let Some(query) = build_query(&record) {
                    if let Some(found) = self.search_first(&query, options).await {
                        merge_missing(&mut record, &found);
                    }
                }
                record
            })
            .buffer_unordered(self.config.max_concurrent_lookups)
            .collect()
            .await
    }

    async fn complete_images(
        &self,
        records: Vec<TrackRecord>,
        request: CompletionRequest,
    ) -> Vec<TrackRecord> {
        let mut groups: BTreeMap<String, Vec<TrackRecord>> = BTreeMap::new();
        for record in records {
            let artist = record.artist.as_deref().map(normalize).unwrap_or_default();
            groups.entry(artist).or_default().push(record);
        }

        let options = SearchOptions::preferring(request.preferred_provider);

        let resolved: Vec<Vec<TrackRecord>> = stream::iter(groups)
            .map(|(artist, mut group)| async move {
                let group_image = if artist.is_empty() {
                    None
                } else {
                    self.search_first(&artist, options)
                        .await
                        .and_then(|found| found.cover_url)
                        .filter(|url| is_valid_image(Some(url.as_str())))
                };

                for record in group.iter_mut() {
                    match &group_image {
                        Some(url) => record.cover_url = Some(url.clone()),
                        None => self.complete_image_individually(record, options).await,
                    }
                }
                group
            })
            .buffer_unordered(self.config.max_concurrent_lookups)
            .collect()
            .await;

        resolved.into_iter().flatten().collect()
    }

    async fn complete_image_individually(&self, record: &mut TrackRecord, options: SearchOptions) {
        let title = record.title.clone().unwrap_or_default();
        let artist = record.artist.clone().unwrap_or_default();

        let attempts = [
            (format!("{} {}", title, artist), options),
            (title, SearchOptions::default()),
        ];

        for (query, options) in attempts {
            if query.trim().is_empty() {
                continue;
            }
            if let Some(found) = self.search_first(query.trim(), options).await {
                if is_valid_image(found.cover_url.as_deref()) {
                    merge_missing(record, &found);
                    return;
                }
            }
        }
    }

    /// Resolves missing canonical IDs. Returns how many were added.
    ///
    /// Targets newly completed records lacking the backfill provider's ID
    /// and originally complete records that carry no canonical ID at all.
    async fn backfill_canonical_ids(
        &self,
        originally_complete: &mut [TrackRecord],
        completed: &mut [TrackRecord],
    ) -> usize {
        let Some(backfill) = &self.backfill else {
            return 0;
        };
        let provider = backfill.resolver.provider();

        let mut pending: Vec<&mut TrackRecord> = completed
            .iter_mut()
            .filter(|r| r.canonical_id(provider).is_none())
            .chain(
                originally_complete
                    .iter_mut()
                    .filter(|r| !r.has_canonical_id()),
            )
            .collect();
        if pending.is_empty() {
            return 0;
        }

        match backfill.quota.quota_status().await {
            Ok(status) if status.has_quota => {
                if let Some(remaining) = status.remaining {
                    pending.truncate(remaining as usize);
                }
            }
            Ok(_) => {
                debug!(provider = %provider, "Quota exhausted, skipping canonical-ID backfill");
                return 0;
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "Quota check failed, skipping backfill");
                return 0;
            }
        }

        let mut added = 0;
        for record in pending {
            match backfill.resolver.resolve(record).await {
                Ok(Some(id)) => {
                    record.canonical_ids.insert(provider, id);
                    added += 1;
                }
                Ok(None) => {}
                Err(e) => debug!(record_id = %record.id, error = %e, "Canonical-ID lookup failed"),
            }
        }

        added
    }

    /// Finds up to `slots` complete records not already in `existing`.
    async fn find_substitutes(
        &self,
        slots: usize,
        existing: &[TrackRecord],
        request: CompletionRequest,
    ) -> Vec<TrackRecord> {
        let mut identities = RecordIdentities::from_records(existing);
        let mut substitutes = Vec::new();
        let options = SearchOptions::preferring(request.preferred_provider);
        let limit = slots * self.config.substitute_overfetch;

        for query in self.substitute_seeds(existing) {
            if substitutes.len() >= slots {
                break;
            }

            let candidates = match self.search.search_tracks(&query, limit, options).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    debug!(query = %query, error = %e, "Substitute search failed");
                    continue;
                }
            };

            for candidate in candidates {
                if substitutes.len() >= slots {
                    break;
                }
                if !is_complete(&candidate)
                    || dedup_key(&candidate).is_none()
                    || identities.contains(&candidate)
                {
                    continue;
                }
                identities.insert(&candidate);
                substitutes.push(candidate);
            }
        }

        if substitutes.len() < slots {
            debug!(
                wanted = slots,
                found = substitutes.len(),
                "Could not fill every dropped slot"
            );
        }

        substitutes
    }

    /// Substitute queries in preference order: artist seed, genre keyword,
    /// popular fallback.
    fn substitute_seeds(&self, existing: &[TrackRecord]) -> Vec<String> {
        let mut seeds = Vec::new();

        if let Some(artist) = existing
            .iter()
            .filter(|r| has_valid_title_artist(r))
            .find_map(|r| r.artist.clone())
        {
            seeds.push(artist);
        }

        if let Some(genre) = infer_genre(existing) {
            seeds.push(genre.to_string());
        }

        seeds.push(self.config.popular_fallback_query.clone());
        seeds.dedup();
        seeds
    }
}

/// First genre keyword found in the batch's artist names.
fn infer_genre(records: &[TrackRecord]) -> Option<&'static str> {
    records
        .iter()
        .filter_map(|r| r.artist.as_deref())
        .map(str::to_lowercase)
        .find_map(|artist| {
            GENRE_KEYWORDS
                .iter()
                .copied()
                .find(|keyword| artist.contains(keyword))
        })
}

#[async_trait]
impl RecordCompleter for EnrichmentPipeline {
    async fn complete(
        &self,
        records: Vec<TrackRecord>,
        request: CompletionRequest,
    ) -> Result<Vec<TrackRecord>> {
        Ok(self.run(records, request).await.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_genre() {
        let records = vec![
            TrackRecord::new("1").with_artist("Someone"),
            TrackRecord::new("2").with_artist("The Jazz Messengers"),
        ];
        assert_eq!(infer_genre(&records), Some("jazz"));
        assert_eq!(infer_genre(&[]), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(EnrichmentConfig::default().validate().is_ok());
        assert!(EnrichmentConfig::default()
            .with_substitute_overfetch(0)
            .validate()
            .is_err());
        assert!(EnrichmentConfig::default()
            .with_popular_fallback_query(" ")
            .validate()
            .is_err());
    }
}
