// src/search.rs
//! Web search collaborator. One HTTP call, ranked results mapped to [`Source`].

use serde::Deserialize;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::types::{Source, TimeFilter};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search API is not configured (set GOOGLE_SEARCH_API and GOOGLE_CX)")]
    NotConfigured,
    #[error("monthly search quota exceeded, try again later")]
    QuotaExceeded,
    #[error("search API returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("search request failed: {0}")]
    Transport(String),
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, filter: TimeFilter) -> Result<Vec<Source>, SearchError>;
}

pub type DynSearch = Arc<dyn SearchProvider>;

/// Google Custom Search JSON API.
pub struct GoogleSearchClient {
    http: reqwest::Client,
    cfg: SearchConfig,
    api_key: Option<String>,
    cx: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl GoogleSearchClient {
    pub fn new(http: reqwest::Client, cfg: SearchConfig, api_key: Option<String>, cx: Option<String>) -> Self {
        Self {
            http,
            cfg,
            api_key,
            cx,
        }
    }

    /// Keys from `GOOGLE_SEARCH_API` / `GOOGLE_CX`; missing keys fail per call, not at startup.
    pub fn from_env(http: reqwest::Client, cfg: SearchConfig) -> Self {
        Self::new(http, cfg, env("GOOGLE_SEARCH_API"), env("GOOGLE_CX"))
    }

    fn query_params(&self, key: &str, cx: &str, query: &str, filter: TimeFilter) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("key", key.to_string()),
            ("cx", cx.to_string()),
            ("num", self.cfg.results_per_page.to_string()),
        ];
        if let Some(d) = filter.date_restrict() {
            params.push(("dateRestrict", d.to_string()));
        }
        if self.cfg.safe_search.eq_ignore_ascii_case("strict") {
            params.push(("safe", "active".to_string()));
        }
        if let Some(lang) = self.cfg.market.split('-').next().filter(|l| !l.is_empty()) {
            params.push(("hl", lang.to_string()));
        }
        params
    }
}

#[async_trait::async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, query: &str, filter: TimeFilter) -> Result<Vec<Source>, SearchError> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.cx.as_deref()) else {
            return Err(SearchError::NotConfigured);
        };

        let resp = self
            .http
            .get(&self.cfg.endpoint)
            .query(&self.query_params(key, cx, query, filter))
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(SearchError::QuotaExceeded);
        }
        if !status.is_success() {
            let message = resp
                .json::<ErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("search API returned error {}", status.as_u16()));
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResp = resp
            .json()
            .await
            .map_err(|e| SearchError::Transport(format!("bad json: {e}")))?;
        let ts_ms = chrono::Utc::now().timestamp_millis();
        let results: Vec<Source> = body
            .items
            .into_iter()
            .filter(|i| !i.link.is_empty())
            .map(|i| Source::from_search(ts_ms, &i.link, &i.title, &i.snippet))
            .collect();
        tracing::info!(target: "api", results = results.len(), filter = ?filter, "search ok");
        Ok(results)
    }
}
