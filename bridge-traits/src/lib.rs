//! # Host Bridge Traits
//!
//! Contracts between the metadata completion engine and the collaborators it
//! depends on but does not own.
//!
//! ## Traits
//!
//! ### Catalog
//! - [`TrackSearch`](catalog::TrackSearch) - Multi-provider track search
//! - [`ProviderClient`](catalog::ProviderClient) - A single provider's search endpoint
//! - [`QuotaMonitor`](catalog::QuotaMonitor) - Remaining capacity for quota-limited lookups
//! - [`CanonicalIdResolver`](catalog::CanonicalIdResolver) - Provider-specific ID lookup
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map transport failures to `OperationFailed`, slow calls to
//! `Timeout` and undecodable payloads to `Parse`. The engine treats all three
//! as "no result from this provider".
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across the engine's worker tasks.

pub mod catalog;
pub mod error;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{
    CanonicalIdResolver, Provider, ProviderClient, QuotaMonitor, QuotaStatus, SearchOptions,
    TrackRecord, TrackSearch,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
