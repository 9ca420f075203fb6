//! Priority scoring and provider distribution

use crate::config::{sections, PriorityWeights};
use bridge_traits::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the user is currently looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityContext {
    pub page: Option<String>,
    pub section: Option<String>,
}

impl PriorityContext {
    pub fn new(page: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            page: Some(page.into()),
            section: Some(section.into()),
        }
    }
}

/// Where a batch of records will be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub page: String,
    pub section: String,
    pub is_visible: bool,
    pub preferred_provider: Option<Provider>,
}

impl LoadOptions {
    /// Visible records on `page`/`section` with no provider preference.
    pub fn new(page: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            section: section.into(),
            is_visible: true,
            preferred_provider: None,
        }
    }

    pub fn visible(mut self, is_visible: bool) -> Self {
        self.is_visible = is_visible;
        self
    }

    pub fn preferring(mut self, provider: Provider) -> Self {
        self.preferred_provider = Some(provider);
        self
    }
}

/// Priority score of a job under the current context. Higher runs first.
pub fn score(weights: &PriorityWeights, context: &PriorityContext, options: &LoadOptions) -> i64 {
    let mut score = if options.is_visible {
        weights.visible_base
    } else {
        weights.offscreen_base
    };

    if context.page.as_deref() == Some(options.page.as_str()) {
        score += weights.page_match_bonus;
    }
    if context.section.as_deref() == Some(options.section.as_str()) {
        score += weights.section_match_bonus;
    }

    score + weights.section_weight(&options.section)
}

/// Suggested share of lookups per provider for a section, in percent.
///
/// Informational only: the pipeline does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDistribution {
    pub section: String,
    pub shares: BTreeMap<Provider, u8>,
}

impl ProviderDistribution {
    pub fn percent(&self, provider: Provider) -> u8 {
        self.shares.get(&provider).copied().unwrap_or(0)
    }
}

pub fn provider_distribution(section: &str) -> ProviderDistribution {
    let (spotify, youtube, lastfm) = match section {
        sections::FOR_YOU => (60, 30, 10),
        sections::RECENTLY_PLAYED => (50, 40, 10),
        sections::TRENDING => (40, 50, 10),
        sections::NEW_RELEASES => (70, 20, 10),
        sections::RECOMMENDATIONS => (50, 20, 30),
        sections::GENRES => (40, 20, 40),
        sections::SEARCH => (40, 40, 20),
        _ => (34, 33, 33),
    };

    ProviderDistribution {
        section: section.to_string(),
        shares: BTreeMap::from([
            (Provider::Spotify, spotify),
            (Provider::YouTube, youtube),
            (Provider::LastFm, lastfm),
        ]),
    }
}
