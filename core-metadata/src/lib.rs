//! # Metadata Completion
//!
//! Completes partially-known track records from several unreliable metadata
//! providers.
//!
//! ## Overview
//!
//! This crate provides:
//! - Record classification and field merging ([`validation`])
//! - Per-provider health bookkeeping ([`ProviderHealthTracker`])
//! - Health-aware routing across provider clients ([`MultiProviderSearch`])
//! - The batch enrichment pipeline ([`EnrichmentPipeline`])
//!
//! Provider failures never surface to callers as errors: a failed lookup
//! leaves a field unresolved and is recorded against the provider's health.

pub mod error;
pub mod health;
pub mod pipeline;
pub mod providers;
pub mod validation;

pub use bridge_traits::{Provider, TrackRecord};
pub use error::{MetadataError, Result};
pub use health::{HealthConfig, ProviderHealthTracker, ProviderStatus};
pub use pipeline::{
    CompletionRequest, EnrichmentConfig, EnrichmentOutcome, EnrichmentPipeline, EnrichmentReport,
    RecordCompleter,
};
pub use providers::{MultiProviderSearch, ProviderCallConfig};
pub use validation::RecordStatus;
