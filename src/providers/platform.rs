//! Platform Client
//!
//! Authenticated REST client for the social platform. Responses arrive in
//! a `{success, data, error}` envelope; every failure is classified
//! through the guard before it reaches the orchestrator. Outbound
//! requests are paced through a sliding-window limiter kept below the
//! platform's published rate limit, so the agent does not walk into a
//! 429 it could have avoided. The bearer key is only ever sent to the
//! host the client was configured with.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::errors::ProviderError;
use crate::guard::{
    classify_envelope_error, classify_request_error, classify_status, RateLimiter,
};
use crate::types::{FeedSort, NewPost, Post, VoteDirection};

use super::PlatformClient;

/// Platform rate limit: 100 requests per minute; stay under it.
const MAX_REQUESTS_PER_WINDOW: usize = 90;
const REQUEST_WINDOW: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug)]
pub struct PlatformHttpClient {
    base_url: String,
    api_key: String,
    trusted_host: String,
    http: Client,
    limiter: RateLimiter,
}

impl PlatformHttpClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let url = Url::parse(base_url)
            .map_err(|e| ProviderError::fatal(format!("invalid platform URL '{base_url}': {e}")))?;
        let trusted_host = url
            .host_str()
            .ok_or_else(|| ProviderError::fatal(format!("platform URL '{base_url}' has no host")))?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::fatal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            trusted_host,
            http,
            limiter: RateLimiter::new(MAX_REQUESTS_PER_WINDOW, REQUEST_WINDOW),
        })
    }

    /// Refuse to attach credentials to a request that would leave the
    /// configured host.
    fn ensure_trusted(&self, url: &str) -> Result<(), ProviderError> {
        let parsed = Url::parse(url)
            .map_err(|e| ProviderError::fatal(format!("invalid request URL '{url}': {e}")))?;
        match parsed.host_str() {
            Some(host) if host == self.trusted_host => Ok(()),
            other => Err(ProviderError::fatal(format!(
                "refusing to send API key to untrusted host: {:?}",
                other
            ))),
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        self.ensure_trusted(&url)?;
        self.limiter.acquire().await;

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await.map_err(classify_request_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(classify_request_error)?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ProviderError::transient(format!("malformed platform response: {e}"))
        })?;

        if !envelope.success {
            let error = envelope.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(classify_envelope_error(&error));
        }

        debug!("platform {} {} ok", method, path);
        Ok(envelope.data)
    }
}

#[async_trait]
impl PlatformClient for PlatformHttpClient {
    async fn fetch_announcements(&self) -> Result<String, ProviderError> {
        let url = format!("{}/announcements", self.base_url);
        self.limiter.acquire().await;
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(classify_request_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(classify_request_error)?;
        if !status.is_success() {
            return Err(classify_status(status, &text));
        }
        Ok(text)
    }

    async fn fetch_feed(&self, sort: FeedSort) -> Result<Vec<Post>, ProviderError> {
        let posts: Option<Vec<Post>> = self
            .request(
                reqwest::Method::GET,
                &format!("/posts?sort={}", sort.as_str()),
                None,
            )
            .await?;
        Ok(posts.unwrap_or_default())
    }

    async fn create_comment(&self, post_id: &str, body: &str) -> Result<(), ProviderError> {
        let _: Option<serde_json::Value> = self
            .request(
                reqwest::Method::POST,
                "/comments",
                Some(json!({ "post_id": post_id, "body": body })),
            )
            .await?;
        Ok(())
    }

    async fn vote(&self, post_id: &str, direction: VoteDirection) -> Result<(), ProviderError> {
        let _: Option<serde_json::Value> = self
            .request(
                reqwest::Method::POST,
                "/vote",
                Some(json!({ "target_id": post_id, "direction": direction.as_str() })),
            )
            .await?;
        Ok(())
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, ProviderError> {
        let created: Option<Post> = self
            .request(
                reqwest::Method::POST,
                "/posts",
                Some(json!({
                    "title": post.title,
                    "body": post.body,
                    "submolt": post.submolt,
                })),
            )
            .await?;
        created.ok_or_else(|| {
            ProviderError::transient("platform returned no post data for create_post".to_string())
        })
    }
}
