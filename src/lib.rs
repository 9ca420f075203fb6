//! Workspace placeholder crate.
//!
//! This crate exists so host applications can depend on a single package and
//! pick up the metadata completion engine through the `engine` feature
//! (enabled by default), without wiring each `core-*` crate individually.

#[cfg(feature = "engine")]
pub use core_service::{CompletionEngine, CoreError, EngineConfig, EngineDependencies};
