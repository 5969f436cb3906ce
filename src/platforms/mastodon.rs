//! Mastodon posting adapter
//!
//! Posts statuses through `POST /api/v1/statuses` with a bearer token.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::models::Platform;
use crate::utils::error::PostError;

use super::{check_length, status_to_error, Poster};

/// Mastodon API adapter
pub struct MastodonPoster {
    client: Client,
    base_url: String,
    access_token: String,
}

impl MastodonPoster {
    /// Create an adapter for an instance
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self, PostError> {
        if access_token.is_empty() {
            return Err(PostError::AuthFailed("missing access token".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(crate::utils::error::FetchError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }
}

#[async_trait]
impl Poster for MastodonPoster {
    fn platform(&self) -> Platform {
        Platform::Mastodon
    }

    async fn post_text(&self, text: &str) -> Result<(), PostError> {
        check_length(Platform::Mastodon, text)?;

        let url = format!("{}/api/v1/statuses", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "status": text }))
            .send()
            .await
            .map_err(crate::utils::error::FetchError::Http)?;

        let status = response.status();
        if status.is_success() {
            debug!(chars = text.chars().count(), "Posted status to Mastodon");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_to_error(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .and(header("authorization", "Bearer token123"))
            .and(body_json_string(r#"{"status":"hello fediverse"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\": \"1\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let poster =
            MastodonPoster::new(&server.uri(), "token123", Duration::from_secs(5)).unwrap();
        poster.post_text("hello fediverse").await.unwrap();
    }

    #[tokio::test]
    async fn test_post_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let poster = MastodonPoster::new(&server.uri(), "bad", Duration::from_secs(5)).unwrap();
        let err = poster.post_text("hello").await.unwrap_err();
        assert!(matches!(err, PostError::AuthFailed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_post_server_error_is_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let poster = MastodonPoster::new(&server.uri(), "token", Duration::from_secs(5)).unwrap();
        let err = poster.post_text("hello").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_token_rejected_at_construction() {
        let result = MastodonPoster::new("https://example.org", "", Duration::from_secs(5));
        assert!(matches!(result, Err(PostError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_over_length_rejected_without_request() {
        // No mock server mounted: an HTTP call would fail the test
        let poster =
            MastodonPoster::new("http://127.0.0.1:9", "token", Duration::from_secs(1)).unwrap();
        let long = "x".repeat(501);
        let err = poster.post_text(&long).await.unwrap_err();
        assert!(matches!(err, PostError::TooLong { .. }));
    }
}
