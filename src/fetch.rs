// src/fetch.rs
//! Content fetcher: resolves one URL to readable text through an external
//! readability service. Failures are expected and frequent; no retry here.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;

use crate::rate_limit::{LimitConfig, OpClass, RateLimiter};
use crate::telemetry::short_hash;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Fallback-eligible: the caller substitutes other content.
    #[error("fetch failed: {0}")]
    Failed(String),
    /// Admission denied for this URL; callers must stop, not fall back.
    #[error("content fetch rate limited")]
    RateLimited,
    #[error("fetch admission check failed: {0}")]
    Internal(String),
}

#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

pub type DynFetcher = Arc<dyn ContentFetcher>;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reader-mode extraction service (`r.jina.ai`-style: `GET {base}/{encoded url}`).
pub struct ReaderFetcher {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ReaderFetcher {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: env("JINA_API_KEY"),
            timeout,
        }
    }

    pub fn endpoint_for(&self, url: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        format!("{}/{}", self.base_url.trim_end_matches('/'), encoded)
    }
}

#[async_trait::async_trait]
impl ContentFetcher for ReaderFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut rb = self.http.get(self.endpoint_for(url)).timeout(self.timeout);
        if let Some(k) = &self.api_key {
            rb = rb.bearer_auth(k);
        }
        let resp = rb.send().await.map_err(|e| {
            tracing::warn!(target: "acquire", url = %short_hash(url), error = %e, "reader transport error");
            FetchError::Failed(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(target: "acquire", url = %short_hash(url), %status, "reader non-success status");
            return Err(FetchError::Failed(format!("reader HTTP {status}")));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(FetchError::Failed("reader returned empty content".into()));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "reader"
    }
}

/// Wraps a fetcher with per-URL admission control.
pub struct RateLimitedFetcher<F: ContentFetcher> {
    inner: F,
    limiter: RateLimiter,
    limit: LimitConfig,
}

impl<F: ContentFetcher> RateLimitedFetcher<F> {
    pub fn new(inner: F, limiter: RateLimiter, limit: LimitConfig) -> Self {
        Self {
            inner,
            limiter,
            limit,
        }
    }
}

#[async_trait::async_trait]
impl<F: ContentFetcher> ContentFetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let admission = self
            .limiter
            .allow_class(OpClass::ContentFetch, Some(url), self.limit)
            .await
            .map_err(|e| FetchError::Internal(e.to_string()))?;
        if !admission.is_admitted() {
            counter!("content_fetch_total", "mode" => "rate_limited").increment(1);
            return Err(FetchError::RateLimited);
        }
        self.inner.fetch(url).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
