//! crier - social posting automation daemon
//!
//! A single-process automation suite that selects content and posts it to
//! Twitter, Mastodon, and BlueSky on a schedule.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`scheduler`] - Cron-driven task execution with retry/backoff
//! - [`coordinator`] - Cross-platform content lifecycle, dedup, and pacing
//! - [`rotator`] - Freshness-aware weighted content selection
//! - [`rss`] - Feed polling with pubDate-ordered staggered fan-out
//! - [`platforms`] - Thin posting adapters behind one trait
//! - [`storage`] - Atomic JSON state files and the instance lock
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use crier::config::Config;
//! use crier::coordinator::Coordinator;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     let coordinator = Coordinator::new();
//!     let _ = (config, coordinator);
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;
pub mod platforms;
pub mod rotator;
pub mod rss;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coordinator::{ContentItem, Coordinator, PostStatus};
    pub use crate::error::{CrierErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{content_hash, ContentKind, Platform};
    pub use crate::rotator::ContentRotator;
    pub use crate::rss::RssWatcher;
    pub use crate::scheduler::{ScheduledTask, Scheduler, TaskStatus};
}

// Direct re-exports for convenience
pub use models::{ContentKind, Platform};
