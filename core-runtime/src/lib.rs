//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the metadata completion engine:
//! - Logging and tracing infrastructure
//! - Event bus for scheduler and provider-health notifications
//! - The shared runtime error type
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other `core-*` crate
//! depends on. It establishes the logging conventions and event
//! broadcasting mechanism used throughout the engine.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
