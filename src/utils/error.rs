//! Error types shared by the HTTP-facing modules
//!
//! This module defines custom error types used by the feed fetcher and the
//! platform posting adapters.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while parsing a feed document
#[derive(Error, Debug)]
pub enum FeedError {
    /// Document contained no items
    #[error("No items found in feed")]
    NoItems,

    /// Feed format was not recognized as RSS or Atom
    #[error("Unknown or unsupported feed format")]
    UnknownFormat,

    /// Publish date could not be parsed
    #[error("Invalid publish date: {0}")]
    InvalidDate(String),
}

/// Errors raised by platform posting adapters
#[derive(Error, Debug)]
pub enum PostError {
    /// Fetch-level error (transport, timeout, retries)
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The platform rejected the post
    #[error("Platform rejected post: {0}")]
    Rejected(String),

    /// Authentication against the platform failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Post text exceeds the platform length limit
    #[error("Post text too long: {len} > {limit}")]
    TooLong { len: usize, limit: usize },

    /// Posting is disabled for this platform
    #[error("Posting disabled for platform")]
    Disabled,
}

impl PostError {
    /// Whether another attempt against the same platform may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(FetchError::Http(_))
            | Self::Fetch(FetchError::Timeout)
            | Self::Fetch(FetchError::ServerError(_))
            | Self::Fetch(FetchError::RateLimit) => true,
            Self::Fetch(_) => false,
            Self::Rejected(_) | Self::AuthFailed(_) | Self::TooLong { .. } | Self::Disabled => {
                false
            }
        }
    }
}
