//! Twitter posting adapter
//!
//! Posts through `POST /2/tweets` with a bearer token. Disabled unless a
//! token is configured; API access is limited on the free tier.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::models::Platform;
use crate::utils::error::PostError;

use super::{check_length, status_to_error, Poster};

/// Twitter v2 API adapter
pub struct TwitterPoster {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterPoster {
    /// Create an adapter
    pub fn new(base_url: &str, bearer_token: &str, timeout: Duration) -> Result<Self, PostError> {
        if bearer_token.is_empty() {
            return Err(PostError::Disabled);
        }

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(crate::utils::error::FetchError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
        })
    }
}

#[async_trait]
impl Poster for TwitterPoster {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn post_text(&self, text: &str) -> Result<(), PostError> {
        check_length(Platform::Twitter, text)?;

        let url = format!("{}/2/tweets", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(crate::utils::error::FetchError::Http)?;

        let status = response.status();
        if status.is_success() {
            debug!(chars = text.chars().count(), "Posted tweet");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_to_error(status, body))
    }
}
