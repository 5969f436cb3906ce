//! RSS watcher: deduplicated, pubDate-ordered, staggered fan-out posting
//!
//! One `run_once` cycle gathers every eligible unseen item across all feeds,
//! sorts by publish date, and posts ONLY the oldest — draining a backlog one
//! item per cycle, in publish order.
//!
//! With staggered posting enabled, state is persisted BEFORE the posting
//! task launches: a crash or a total posting failure can skip an item but
//! never repost one. Items that fail on every platform stay marked as
//! processed, which keeps persistent failures from turning into spam loops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{HttpConfig, RssConfig};
use crate::error::Result;
use crate::metrics;
use crate::platforms::Poster;
use crate::storage::StateStore;

use super::feed::{self, FeedFetcher, FeedItem};
use super::state::WatcherState;

/// What a single watch cycle did
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Eligible items found across all feeds
    pub eligible: usize,

    /// Guid of the item handed off for posting, if any
    pub posted_guid: Option<String>,

    /// Handle of the background stagger task, when staggering is enabled
    pub stagger_handle: Option<JoinHandle<bool>>,
}

/// Feed watcher with crash-safe fan-out posting
pub struct RssWatcher {
    config: RssConfig,
    fetcher: FeedFetcher,
    state: WatcherState,
    posters: Vec<Arc<dyn Poster>>,
}

impl RssWatcher {
    /// Create a watcher
    pub fn new(
        config: RssConfig,
        http: &HttpConfig,
        store: StateStore,
        posters: Vec<Arc<dyn Poster>>,
    ) -> Result<Self> {
        let fetcher = FeedFetcher::with_config(
            http.requests_per_second,
            &http.user_agent,
            3,
            std::time::Duration::from_secs(http.request_timeout_secs),
        )?;

        Ok(Self {
            config,
            fetcher,
            state: WatcherState::load(store),
            posters,
        })
    }

    /// Access the watcher state (for status displays)
    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    /// Run one poll-select-post cycle
    pub async fn run_once(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let mut outcome = CycleOutcome::default();

        if self.config.feeds.is_empty() {
            warn!("No RSS feeds configured, skipping run");
            return Ok(outcome);
        }
        if self.posters.is_empty() {
            error!("No platform adapters available, cannot post");
            return Ok(outcome);
        }

        let eligible = self.collect_eligible().await;
        outcome.eligible = eligible.len();

        let Some((feed_url, item, pubdate)) = eligible.into_iter().next() else {
            info!("No eligible items to post (queue empty or all items too old)");
            self.state.touch_checked(now);
            return Ok(outcome);
        };

        info!(
            eligible = outcome.eligible,
            pubdate = %pubdate,
            title = %item.title.chars().take(50).collect::<String>(),
            "Posting oldest eligible item"
        );

        let text = feed::teaser(
            &item.title,
            &item.summary,
            &item.link,
            self.config.teaser_max_chars,
        );

        if self.config.staggered.enabled {
            // Mark processed BEFORE the posting task launches so the next
            // cycle can never pick this item up again
            self.state.mark_seen(&feed_url, &item.guid);
            self.state.mark_posted(&item.guid);
            self.state.set_last_pubdate(pubdate);

            let handle = tokio::spawn(stagger_post(
                self.posters.clone(),
                text,
                self.config.stagger_delay_minutes(),
                self.config.staggered.randomize_platform_order,
                item.guid.clone(),
            ));
            outcome.stagger_handle = Some(handle);
            outcome.posted_guid = Some(item.guid);
        } else {
            let posted_any = self.post_sequential(&text).await;
            if posted_any {
                self.state.mark_seen(&feed_url, &item.guid);
                self.state.mark_posted(&item.guid);
                self.state.set_last_pubdate(pubdate);
                outcome.posted_guid = Some(item.guid);
            } else {
                warn!(guid = %item.guid, "Failed to post to any platform");
            }
        }

        self.state.touch_checked(now);
        Ok(outcome)
    }

    /// Gather eligible unseen items from every feed, oldest first
    async fn collect_eligible(&mut self) -> Vec<(String, FeedItem, DateTime<Utc>)> {
        let mut eligible = Vec::new();

        for feed_url in self.config.feeds.clone() {
            let items = match self.fetcher.fetch_feed(&feed_url).await {
                Ok(items) => {
                    metrics::record_feed_poll(true);
                    items
                }
                Err(e) => {
                    metrics::record_feed_poll(false);
                    error!(feed = %feed_url, error = %e, "Feed processing error");
                    continue;
                }
            };

            let last_seen = self.state.last_seen(&feed_url).map(str::to_string);
            let first_run = last_seen.is_none();

            // Feed order is newest first; stop at the last item we saw
            let mut unseen: Vec<FeedItem> = Vec::new();
            for item in items {
                if last_seen.as_deref() == Some(item.guid.as_str()) {
                    break;
                }
                if !self.state.is_posted(&item.guid) {
                    unseen.push(item);
                }
            }

            if first_run && !unseen.is_empty() {
                if self.config.post_on_first_run {
                    info!(feed = %feed_url, "First run, considering newest item only");
                    unseen.truncate(1);
                } else {
                    info!(feed = %feed_url, "First run, marking newest as seen without posting");
                    self.state.mark_seen(&feed_url, &unseen[0].guid);
                    continue;
                }
            }

            if unseen.is_empty() {
                debug!(feed = %feed_url, "No new items");
                continue;
            }

            for item in unseen {
                let Some(pubdate) = item.parsed_pubdate() else {
                    warn!(guid = %item.guid.chars().take(50).collect::<String>(), "Item has no valid pubDate, skipping");
                    continue;
                };

                if let Some(high_water) = self.state.last_pubdate() {
                    if pubdate <= high_water {
                        debug!(
                            pubdate = %pubdate,
                            high_water = %high_water,
                            "Skipping item older than last posted"
                        );
                        continue;
                    }
                }

                eligible.push((feed_url.clone(), item, pubdate));
            }
        }

        eligible.sort_by_key(|(_, _, pubdate)| *pubdate);
        eligible
    }

    /// Immediate mode: post to every platform in order with short delays
    async fn post_sequential(&self, text: &str) -> bool {
        let (lo, hi) = self.config.post_delay_seconds;
        let mut posted_any = false;

        for (i, poster) in self.posters.iter().enumerate() {
            if post_with_retry(poster.as_ref(), text).await {
                posted_any = true;
            }

            if i < self.posters.len() - 1 {
                let delay = { rand::thread_rng().gen_range(lo..=hi) };
                tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
            }
        }

        posted_any
    }
}

/// Post with one retry, isolating failures per platform
async fn post_with_retry(poster: &dyn Poster, text: &str) -> bool {
    let platform = poster.platform();

    for attempt in 1..=2 {
        match poster.post_text(text).await {
            Ok(()) => {
                metrics::record_post(platform.id(), true);
                return true;
            }
            Err(e) => {
                warn!(platform = %platform, attempt, error = %e, "Post attempt failed");
                if !e.is_retryable() {
                    break;
                }
            }
        }
    }

    metrics::record_post(platform.id(), false);
    error!(platform = %platform, "Giving up after 2 attempts");
    false
}

/// Background staggered posting: shuffled platform order, randomized delay
/// between platforms
async fn stagger_post(
    posters: Vec<Arc<dyn Poster>>,
    text: String,
    delay_minutes: (u64, u64),
    randomize_order: bool,
    guid: String,
) -> bool {
    let mut order = posters;
    if randomize_order {
        order.shuffle(&mut rand::thread_rng());
        let names: Vec<&str> = order.iter().map(|p| p.platform().id()).collect();
        info!(guid = %guid.chars().take(50).collect::<String>(), order = ?names, "Starting staggered posting cycle");
    }

    let (lo, hi) = delay_minutes;
    let mut posted_any = false;

    for (i, poster) in order.iter().enumerate() {
        let platform = poster.platform();
        info!(platform = %platform, position = i + 1, total = order.len(), "Posting to platform");

        if post_with_retry(poster.as_ref(), &text).await {
            posted_any = true;
            info!(platform = %platform, "Posted");
        } else {
            warn!(platform = %platform, "Failed to post");
        }

        if i < order.len() - 1 {
            let delay = { rand::thread_rng().gen_range(lo..=hi) };
            let next = order[i + 1].platform();
            info!(minutes = delay, next = %next, "Waiting before next platform");
            tokio::time::sleep(std::time::Duration::from_secs(delay * 60)).await;
        }
    }

    if posted_any {
        info!(guid = %guid.chars().take(50).collect::<String>(), "Completed posting cycle");
    } else {
        // Already marked processed before launch; never reposted
        error!(guid = %guid.chars().take(50).collect::<String>(), "Failed to post to any platform");
    }

    posted_any
}

// ============================================================================
// Tests
// ============================================================================
