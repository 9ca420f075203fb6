//! Catalog Collaborator Abstractions
//!
//! Contracts for the external metadata providers the completion engine talks
//! to. The engine never implements a provider itself: hosts inject concrete
//! clients (music catalogs, video platform search, tag services) and the
//! engine only decides when and in which order to call them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// External metadata provider.
///
/// Declaration order is the static preference order: the first variant has
/// the best rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Music catalog service
    Spotify,
    /// Video platform search API
    YouTube,
    /// Crowd-sourced tag service
    LastFm,
}

impl Provider {
    /// All providers in static preference order.
    pub const ALL: [Provider; 3] = [Provider::Spotify, Provider::YouTube, Provider::LastFm];

    /// Static priority rank. Lower is better.
    pub fn priority_rank(&self) -> u8 {
        match self {
            Self::Spotify => 1,
            Self::YouTube => 2,
            Self::LastFm => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::YouTube => "youtube",
            Self::LastFm => "lastfm",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spotify" => Ok(Self::Spotify),
            "youtube" => Ok(Self::YouTube),
            "lastfm" | "last.fm" => Ok(Self::LastFm),
            other => Err(BridgeError::NotAvailable(format!("Unknown provider: {}", other))),
        }
    }
}

/// A partially or fully known music track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Engine-internal identity, opaque to providers
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover_url: Option<String>,
    pub duration_seconds: Option<u32>,
    /// Provider-specific canonical IDs
    #[serde(default)]
    pub canonical_ids: BTreeMap<Provider, String>,
    /// Provider the record originally came from
    pub source: Option<Provider>,
}

impl TrackRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_canonical_id(mut self, provider: Provider, id: impl Into<String>) -> Self {
        self.canonical_ids.insert(provider, id.into());
        self
    }

    pub fn with_source(mut self, source: Provider) -> Self {
        self.source = Some(source);
        self
    }

    pub fn canonical_id(&self, provider: Provider) -> Option<&str> {
        self.canonical_ids.get(&provider).map(String::as_str)
    }

    pub fn has_canonical_id(&self) -> bool {
        !self.canonical_ids.is_empty()
    }
}

/// Per-call search options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Restrict or bias the search to one provider
    pub preferred_provider: Option<Provider>,
    /// Skip cached results
    pub force_fresh: bool,
}

impl SearchOptions {
    pub fn preferring(provider: Option<Provider>) -> Self {
        Self {
            preferred_provider: provider,
            force_fresh: false,
        }
    }

    pub fn with_force_fresh(mut self, force_fresh: bool) -> Self {
        self.force_fresh = force_fresh;
        self
    }
}

/// Remaining-capacity report for a quota-limited provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub has_quota: bool,
    pub remaining: Option<u32>,
}

/// Multi-provider track search.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{SearchOptions, TrackSearch};
///
/// async fn first_hit(search: &dyn TrackSearch, query: &str) -> Option<String> {
///     let results = search.search_tracks(query, 1, SearchOptions::default()).await.ok()?;
///     results.into_iter().next().and_then(|r| r.title)
/// }
/// ```
#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        options: SearchOptions,
    ) -> Result<Vec<TrackRecord>>;
}

/// Single-provider search client.
///
/// Implementations are expected to map network and decoding failures to
/// [`BridgeError::OperationFailed`] and [`BridgeError::Parse`].
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackRecord>>;
}

/// Quota check for the canonical-ID backfill provider.
#[async_trait]
pub trait QuotaMonitor: Send + Sync {
    async fn quota_status(&self) -> Result<QuotaStatus>;
}

/// Resolves a provider-specific canonical ID for a record.
#[async_trait]
pub trait CanonicalIdResolver: Send + Sync {
    /// Provider whose IDs this resolver produces
    fn provider(&self) -> Provider;

    async fn resolve(&self, record: &TrackRecord) -> Result<Option<String>>;
}
