//! Record classification and merging
//!
//! Decides what a [`TrackRecord`] is missing and merges lookup results into it
//! without overwriting fields that are already usable.

use bridge_traits::{Provider, TrackRecord};
use std::collections::HashSet;

/// Case-insensitive substrings that mark a title or artist as a placeholder.
const TEXT_SENTINELS: &[&str] = &[
    "unknown",
    "various",
    "untitled",
    "no title",
    "placeholder",
    "n/a",
    "[deleted]",
];

/// Case-insensitive URL fragments of provider placeholder artwork.
const PLACEHOLDER_IMAGE_PATTERNS: &[&str] = &[
    "placeholder",
    "default-cover",
    "default_cover",
    "no-cover",
    "no_cover",
    "no-image",
    "noimage",
    "blank.gif",
    "2a96cbd8b46e442fc41c2b86b821562f",
];

/// What a record still needs before it can be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Complete,
    MissingImage,
    MissingTitleOrArtist,
}

/// A title or artist value that is present, non-blank and not a sentinel.
pub fn is_valid_text(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => {
            let lower = text.to_lowercase();
            !TEXT_SENTINELS.iter().any(|s| lower.contains(s))
        }
        _ => false,
    }
}

/// A cover URL that is present and not a known placeholder.
pub fn is_valid_image(url: Option<&str>) -> bool {
    match url.map(str::trim) {
        Some(url) if !url.is_empty() => {
            let lower = url.to_lowercase();
            !PLACEHOLDER_IMAGE_PATTERNS.iter().any(|p| lower.contains(p))
        }
        _ => false,
    }
}

pub fn has_valid_title_artist(record: &TrackRecord) -> bool {
    is_valid_text(record.title.as_deref()) && is_valid_text(record.artist.as_deref())
}

pub fn classify(record: &TrackRecord) -> RecordStatus {
    if !has_valid_title_artist(record) {
        RecordStatus::MissingTitleOrArtist
    } else if !is_valid_image(record.cover_url.as_deref()) {
        RecordStatus::MissingImage
    } else {
        RecordStatus::Complete
    }
}

pub fn is_complete(record: &TrackRecord) -> bool {
    classify(record) == RecordStatus::Complete
}

/// Lower-cased, trimmed, whitespace-collapsed text.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deduplication key `artist:title`, if both are known.
pub fn dedup_key(record: &TrackRecord) -> Option<String> {
    let title = record.title.as_deref().map(normalize)?;
    let artist = record.artist.as_deref().map(normalize)?;
    if title.is_empty() || artist.is_empty() {
        return None;
    }
    Some(format!("{}:{}", artist, title))
}

/// Best-effort lookup query from whatever the record carries.
///
/// Falls back to a known canonical ID when neither title nor artist is usable.
pub fn build_query(record: &TrackRecord) -> Option<String> {
    let usable = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| is_valid_text(Some(*v)))
            .map(str::to_string)
    };

    let parts: Vec<String> = [
        usable(record.title.as_deref()),
        usable(record.artist.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !parts.is_empty() {
        return Some(parts.join(" "));
    }

    record.canonical_ids.values().next().cloned()
}

/// Fills the fields of `target` that are missing or invalid from `found`.
///
/// Returns whether anything changed.
pub fn merge_missing(target: &mut TrackRecord, found: &TrackRecord) -> bool {
    let mut changed = false;

    if !is_valid_text(target.title.as_deref()) && is_valid_text(found.title.as_deref()) {
        target.title = found.title.clone();
        changed = true;
    }
    if !is_valid_text(target.artist.as_deref()) && is_valid_text(found.artist.as_deref()) {
        target.artist = found.artist.clone();
        changed = true;
    }
    if target.album.is_none() && found.album.is_some() {
        target.album = found.album.clone();
        changed = true;
    }
    if !is_valid_image(target.cover_url.as_deref()) && is_valid_image(found.cover_url.as_deref())
    {
        target.cover_url = found.cover_url.clone();
        changed = true;
    }
    if target.duration_seconds.is_none() && found.duration_seconds.is_some() {
        target.duration_seconds = found.duration_seconds;
        changed = true;
    }
    for (provider, id) in &found.canonical_ids {
        if !target.canonical_ids.contains_key(provider) {
            target.canonical_ids.insert(*provider, id.clone());
            changed = true;
        }
    }

    changed
}

/// Identity set of a batch, used to reject duplicate substitutes.
#[derive(Debug, Default)]
pub struct RecordIdentities {
    keys: HashSet<String>,
    canonical_ids: HashSet<(Provider, String)>,
}

impl RecordIdentities {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TrackRecord>) -> Self {
        let mut identities = Self::default();
        for record in records {
            identities.insert(record);
        }
        identities
    }

    pub fn contains(&self, record: &TrackRecord) -> bool {
        dedup_key(record).is_some_and(|key| self.keys.contains(&key))
            || record
                .canonical_ids
                .iter()
                .any(|(p, id)| self.canonical_ids.contains(&(*p, id.clone())))
    }

    pub fn insert(&mut self, record: &TrackRecord) {
        if let Some(key) = dedup_key(record) {
            self.keys.insert(key);
        }
        for (provider, id) in &record.canonical_ids {
            self.canonical_ids.insert((*provider, id.clone()));
        }
    }
}
