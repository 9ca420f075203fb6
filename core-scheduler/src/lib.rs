//! # Priority Scheduler
//!
//! Orders completion jobs by what the user is currently viewing and drains
//! them through the enrichment pipeline under a global concurrency cap.
//!
//! ## Scoring
//!
//! ```text
//! base  = visible ? visible_base : offscreen_base
//! base += page_match_bonus     if page    == context.page
//! base += section_match_bonus  if section == context.section
//! base += section_weights[section]
//! ```
//!
//! Equal scores run in submission order. Scores are recomputed whenever the
//! context changes and immediately before every dequeue.

pub mod config;
pub mod error;
pub mod job;
pub mod priority;
pub mod queue;
pub mod scheduler;

pub use config::{sections, PriorityWeights, SchedulerConfig};
pub use error::{Result, SchedulerError};
pub use job::{CompletionCallback, JobId, JobState, JobSummary};
pub use priority::{provider_distribution, LoadOptions, PriorityContext, ProviderDistribution};
pub use scheduler::{PriorityScheduler, SchedulerStats};
