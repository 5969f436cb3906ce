//! RSS watching and fan-out posting
//!
//! Polls configured feeds, tracks what has been seen and posted, and posts
//! the oldest eligible unseen item per cycle — staggered across platforms
//! by background tasks with randomized order and delays.
//!
//! # Modules
//!
//! - [`feed`] - Fetching, parsing, and teaser generation
//! - [`state`] - The watcher's three JSON state files
//! - [`watcher`] - The poll-select-post cycle

pub mod feed;
pub mod state;
pub mod watcher;

pub use feed::{parse_feed, parse_pubdate, teaser, FeedFetcher, FeedItem};
pub use state::WatcherState;
pub use watcher::{CycleOutcome, RssWatcher};
