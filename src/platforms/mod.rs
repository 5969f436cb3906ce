//! Platform posting adapters
//!
//! Each adapter is a thin wrapper over the platform's posting endpoint,
//! behind the [`Poster`] trait. Adapter construction failures are isolated:
//! a platform that cannot be built is logged and skipped, the others keep
//! working.
//!
//! All adapters accept a base-URL override so tests can point them at a
//! mock server.

pub mod bluesky;
pub mod mastodon;
pub mod twitter;

pub use bluesky::BlueskyPoster;
pub use mastodon::MastodonPoster;
pub use twitter::TwitterPoster;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Platform;
use crate::utils::error::PostError;

/// A platform that can receive a text post
#[async_trait]
pub trait Poster: Send + Sync {
    /// Which platform this adapter posts to
    fn platform(&self) -> Platform;

    /// Publish a text post
    async fn post_text(&self, text: &str) -> Result<(), PostError>;
}

/// Map an error response to a [`PostError`]
pub(crate) fn status_to_error(status: StatusCode, body: String) -> PostError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PostError::AuthFailed(body),
        StatusCode::TOO_MANY_REQUESTS => {
            PostError::Fetch(crate::utils::error::FetchError::RateLimit)
        }
        s if s.is_server_error() => {
            PostError::Fetch(crate::utils::error::FetchError::ServerError(s.as_u16()))
        }
        _ => PostError::Rejected(format!("{status}: {body}")),
    }
}

/// Check a post against the platform length limit
pub(crate) fn check_length(platform: Platform, text: &str) -> Result<(), PostError> {
    let len = text.chars().count();
    let limit = platform.max_post_chars();
    if len > limit {
        return Err(PostError::TooLong { len, limit });
    }
    Ok(())
}

/// Build adapters for every platform enabled in the config
///
/// A platform whose adapter fails to build is skipped with a warning.
pub fn build_posters(config: &Config) -> Vec<Arc<dyn Poster>> {
    let mut posters: Vec<Arc<dyn Poster>> = Vec::new();
    let timeout = config.request_timeout();

    for platform in config.platforms.enabled() {
        let pc = config.platforms.get(platform);
        let result: Result<Arc<dyn Poster>, PostError> = match platform {
            Platform::Twitter => {
                TwitterPoster::new(&pc.base_url, &pc.access_token, timeout).map(|p| {
                    let p: Arc<dyn Poster> = Arc::new(p);
                    p
                })
            }
            Platform::Mastodon => {
                MastodonPoster::new(&pc.base_url, &pc.access_token, timeout).map(|p| {
                    let p: Arc<dyn Poster> = Arc::new(p);
                    p
                })
            }
            Platform::Bluesky => {
                BlueskyPoster::new(&pc.base_url, &pc.identifier, &pc.access_token, timeout).map(
                    |p| {
                        let p: Arc<dyn Poster> = Arc::new(p);
                        p
                    },
                )
            }
        };

        match result {
            Ok(poster) => {
                info!(platform = %platform, "Platform adapter loaded");
                posters.push(poster);
            }
            Err(e) => {
                warn!(platform = %platform, error = %e, "Platform adapter unavailable, continuing without it");
            }
        }
    }

    posters
}
