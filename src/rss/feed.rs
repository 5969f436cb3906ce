//! Feed fetching and parsing
//!
//! The fetcher is a rate-limited HTTP client with retry and exponential
//! backoff. Parsing handles RSS 2.0 and Atom documents via scraper's lenient
//! markup parser; two feed-specific quirks are smoothed over before and
//! during extraction:
//!
//! - CDATA sections are unwrapped up front (the HTML parser would treat
//!   them as comments and drop the text).
//! - `<link>` is a void element in HTML, so a link's URL ends up in the
//!   text node FOLLOWING the element rather than inside it.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use crate::utils::error::{FeedError, FetchError};
use crate::utils::{strip_markup, truncate_chars};

// ============================================================================
// Feed Items
// ============================================================================

/// One entry parsed out of a feed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Stable item identifier (guid, Atom id, or the link as fallback)
    pub guid: String,

    /// Item title
    pub title: String,

    /// Article URL
    pub link: String,

    /// Item summary or description
    pub summary: String,

    /// Raw publish date string as found in the feed
    pub pubdate: String,
}

impl FeedItem {
    /// Parse the publish date (RFC 2822, then RFC 3339)
    pub fn parsed_pubdate(&self) -> Option<DateTime<Utc>> {
        parse_pubdate(&self.pubdate)
    }
}

/// Parse a feed date string: RFC 2822 first (the RSS convention), RFC 3339
/// second (Atom and the occasional ISO-dated RSS feed)
pub fn parse_pubdate(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

// ============================================================================
// Parsing
// ============================================================================

/// Text content of the first matching child element
fn element_text(parent: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = parent.select(selector).next()?;
    let text: String = element.text().collect::<String>().trim().to_string();

    if !text.is_empty() {
        return Some(text);
    }

    // Void-element fallback: the content was parsed as a following sibling
    let mut sibling = element.next_sibling();
    while let Some(node) = sibling {
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        } else {
            break;
        }
        sibling = node.next_sibling();
    }

    None
}

/// Parse an RSS 2.0 or Atom document into feed items
///
/// Items without an identifier or any text are dropped. Feed order is
/// preserved (conventionally newest first).
pub fn parse_feed(document: &str) -> Result<Vec<FeedItem>, FeedError> {
    // Unwrap CDATA before the HTML parser discards it as comments
    let unwrapped = document.replace("<![CDATA[", "").replace("]]>", "");
    let html = Html::parse_document(&unwrapped);

    let rss_item = Selector::parse("item").expect("valid selector");
    let atom_entry = Selector::parse("entry").expect("valid selector");

    let items: Vec<FeedItem> = if html.select(&rss_item).next().is_some() {
        parse_rss_items(&html, &rss_item)
    } else if html.select(&atom_entry).next().is_some() {
        parse_atom_entries(&html, &atom_entry)
    } else {
        return Err(FeedError::UnknownFormat);
    };

    if items.is_empty() {
        return Err(FeedError::NoItems);
    }

    debug!(items = items.len(), "Parsed feed document");
    Ok(items)
}

fn parse_rss_items(html: &Html, item_selector: &Selector) -> Vec<FeedItem> {
    let guid = Selector::parse("guid").expect("valid selector");
    let title = Selector::parse("title").expect("valid selector");
    let link = Selector::parse("link").expect("valid selector");
    let description = Selector::parse("description").expect("valid selector");
    let pubdate = Selector::parse("pubdate").expect("valid selector");

    html.select(item_selector)
        .filter_map(|item| {
            let link_text = element_text(item, &link).unwrap_or_default();
            let guid_text = element_text(item, &guid).unwrap_or_else(|| link_text.clone());
            let title_text = element_text(item, &title).unwrap_or_default();
            let summary_text = element_text(item, &description).unwrap_or_default();
            let pubdate_text = element_text(item, &pubdate).unwrap_or_default();

            if guid_text.is_empty() || (title_text.is_empty() && summary_text.is_empty()) {
                return None;
            }

            Some(FeedItem {
                guid: guid_text,
                title: title_text,
                link: link_text,
                summary: summary_text,
                pubdate: pubdate_text,
            })
        })
        .collect()
}

fn parse_atom_entries(html: &Html, entry_selector: &Selector) -> Vec<FeedItem> {
    let id = Selector::parse("id").expect("valid selector");
    let title = Selector::parse("title").expect("valid selector");
    let link = Selector::parse("link").expect("valid selector");
    let summary = Selector::parse("summary, content").expect("valid selector");
    let published = Selector::parse("published, updated").expect("valid selector");

    html.select(entry_selector)
        .filter_map(|entry| {
            // Atom links carry the URL in the href attribute
            let link_text = entry
                .select(&link)
                .next()
                .and_then(|e| e.value().attr("href"))
                .map(str::to_string)
                .unwrap_or_default();

            let guid_text = element_text(entry, &id).unwrap_or_else(|| link_text.clone());
            let title_text = element_text(entry, &title).unwrap_or_default();
            let summary_text = element_text(entry, &summary).unwrap_or_default();
            let pubdate_text = element_text(entry, &published).unwrap_or_default();

            if guid_text.is_empty() || (title_text.is_empty() && summary_text.is_empty()) {
                return None;
            }

            Some(FeedItem {
                guid: guid_text,
                title: title_text,
                link: link_text,
                summary: summary_text,
                pubdate: pubdate_text,
            })
        })
        .collect()
}

// ============================================================================
// Teaser
// ============================================================================

/// Build the post body for a feed item: title (or summary) trimmed to the
/// budget, markup stripped, with the article link appended
pub fn teaser(title: &str, summary: &str, link: &str, max_chars: usize) -> String {
    let base = if title.trim().is_empty() { summary } else { title };
    let clean = strip_markup(base);
    let trimmed = truncate_chars(&clean, max_chars);

    if link.is_empty() {
        trimmed
    } else {
        format!("{trimmed} {link}").trim().to_string()
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Rate-limited feed fetcher with retry and exponential backoff
pub struct FeedFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Maximum number of retry attempts for failed requests
    max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,
}

impl FeedFetcher {
    /// Create a fetcher with default retry settings
    pub fn new(requests_per_second: u32, user_agent: &str) -> Result<Self, FetchError> {
        Self::with_config(requests_per_second, user_agent, 3, Duration::from_secs(30))
    }

    /// Create a fetcher with custom retry configuration
    pub fn with_config(
        requests_per_second: u32,
        user_agent: &str,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()?;

        let rate = NonZeroU32::new(requests_per_second)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        let quota = Quota::per_second(rate);
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            base_delay_ms: 1000,
        })
    }

    /// Fetch a feed document with rate limiting and retry
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        self.fetch_with_retry(url).await
    }

    /// Fetch and parse in one step
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedItem>, crate::error::Error> {
        let document = self.fetch(url).await?;
        Ok(parse_feed(&document)?)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay_ms * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.text().await.map_err(FetchError::Http);
                    } else if Self::should_retry(status.as_u16()) {
                        last_error = Some(FetchError::ServerError(status.as_u16()));
                        continue;
                    } else {
                        return Err(FetchError::ServerError(status.as_u16()));
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(FetchError::Timeout);
                    } else {
                        last_error = Some(FetchError::Http(e));
                    }
                }
            }
        }

        let _ = last_error;
        Err(FetchError::MaxRetriesExceeded)
    }

    /// Retry on throttling and transient server errors only
    fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }
}

// ============================================================================
// Tests
// ============================================================================
