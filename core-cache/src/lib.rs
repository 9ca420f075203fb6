//! # Adaptive Cache
//!
//! Time-bounded key/value cache shared by the completion engine's
//! components. Entries are soft state: they expire per category and may be
//! evicted early when the cache is over capacity.
//!
//! - [`AdaptiveCache`] applies TTL, sweep and statistics policy.
//! - [`CacheStore`] is the raw backing storage; [`MemoryCacheStore`] is the
//!   default.
//! - [`CacheCategory`] / [`CacheTtl`] select an entry's lifetime at each
//!   write.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod stats;
pub mod store;

pub use adaptive::{AdaptiveCache, SweepReport};
pub use config::{CacheCategory, CacheConfig, CacheTtl, CategoryTtls};
pub use error::{CacheError, Result};
pub use stats::{CacheStats, DuplicateRequestDetector};
pub use store::{CacheEntry, CacheStore, MemoryCacheStore};
