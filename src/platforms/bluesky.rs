//! BlueSky posting adapter
//!
//! Authenticates against the PDS with `com.atproto.server.createSession`
//! and publishes posts with `com.atproto.repo.createRecord`. The session is
//! reused across posts; a rejected token triggers exactly one re-login.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::Platform;
use crate::utils::error::PostError;

use super::{check_length, status_to_error, Poster};

/// Active PDS session
#[derive(Debug, Clone, Deserialize)]
struct Session {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
}

/// BlueSky PDS adapter
pub struct BlueskyPoster {
    client: Client,
    base_url: String,
    identifier: String,
    app_password: String,
    session: RwLock<Option<Session>>,
}

impl BlueskyPoster {
    /// Create an adapter for a PDS
    pub fn new(
        base_url: &str,
        identifier: &str,
        app_password: &str,
        timeout: Duration,
    ) -> Result<Self, PostError> {
        if identifier.is_empty() || app_password.is_empty() {
            return Err(PostError::AuthFailed(
                "missing handle or app password".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(crate::utils::error::FetchError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            identifier: identifier.to_string(),
            app_password: app_password.to_string(),
            session: RwLock::new(None),
        })
    }

    /// Log in and cache the session
    async fn create_session(&self) -> Result<Session, PostError> {
        let url = format!("{}/xrpc/com.atproto.server.createSession", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "identifier": self.identifier,
                "password": self.app_password,
            }))
            .send()
            .await
            .map_err(crate::utils::error::FetchError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PostError::AuthFailed(format!("{status}: {body}")));
        }

        let session: Session = response
            .json()
            .await
            .map_err(crate::utils::error::FetchError::Http)?;

        info!(did = %session.did, "Created BlueSky session");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Reuse the cached session or log in once
    async fn ensure_session(&self) -> Result<Session, PostError> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }
        self.create_session().await
    }

    async fn create_record(&self, session: &Session, text: &str) -> Result<reqwest::Response, PostError> {
        let url = format!("{}/xrpc/com.atproto.repo.createRecord", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": text,
                    "createdAt": Utc::now().to_rfc3339(),
                },
            }))
            .send()
            .await
            .map_err(|e| PostError::Fetch(crate::utils::error::FetchError::Http(e)))
    }
}

#[async_trait]
impl Poster for BlueskyPoster {
    fn platform(&self) -> Platform {
        Platform::Bluesky
    }

    async fn post_text(&self, text: &str) -> Result<(), PostError> {
        check_length(Platform::Bluesky, text)?;

        let session = self.ensure_session().await?;
        let response = self.create_record(&session, text).await?;

        let status = response.status();
        if status.is_success() {
            debug!(chars = text.chars().count(), "Posted record to BlueSky");
            return Ok(());
        }

        // An expired token gets one fresh session, nothing more
        if status == reqwest::StatusCode::UNAUTHORIZED {
            *self.session.write().await = None;
            let session = self.create_session().await?;
            let response = self.create_record(&session, text).await?;
            if response.status().is_success() {
                debug!("Posted record to BlueSky after session refresh");
                return Ok(());
            }
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status, body));
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_to_error(status, body))
    }
}
