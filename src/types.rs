// src/types.rs
//! Request/response data model shared by the pipeline stages.

use serde::{Deserialize, Serialize};

/// Placeholder snippet for URLs the user typed in by hand.
pub const CUSTOM_URL_SNIPPET: &str = "Custom URL added by user";

/// A selected search result or user-added URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub name: String,
    /// Short preview text from the search step; used as fallback content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snippet: String,
}

impl Source {
    /// Build a source from a ranked search hit. The id embeds `ts_ms` so repeated
    /// searches for the same URL never collide.
    pub fn from_search(ts_ms: i64, url: &str, name: &str, snippet: &str) -> Self {
        Self {
            id: format!("search-{ts_ms}-{url}"),
            url: url.to_string(),
            name: name.to_string(),
            snippet: snippet.to_string(),
        }
    }

    /// Build a source for a URL added by hand. Rejects strings that are not absolute URLs.
    pub fn custom(raw_url: &str) -> Result<Self, url::ParseError> {
        let parsed = url::Url::parse(raw_url.trim())?;
        let ts_ms = chrono::Utc::now().timestamp_millis();
        let url = parsed.to_string();
        Ok(Self {
            id: format!("custom-{ts_ms}-{url}"),
            url,
            name: "Custom URL".to_string(),
            snippet: CUSTOM_URL_SNIPPET.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    Fetched,
    Fallback,
}

/// Per-source text consumed by prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcquiredContent {
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(default = "default_mode")]
    pub acquisition_mode: AcquisitionMode,
}

fn default_mode() -> AcquisitionMode {
    AcquisitionMode::Fetched
}

impl AcquiredContent {
    pub fn is_usable(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
}

/// Final structured report. `sources` is always the caller-supplied list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub title: String,
    pub summary: String,
    pub sections: Vec<Section>,
    pub sources: Vec<Source>,
}

/// Input of one orchestration run.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub sources: Vec<Source>,
    /// Content acquired by the caller beforehand. Empty means "acquire it here".
    pub acquired_content: Vec<AcquiredContent>,
    pub prompt: String,
    pub platform: String,
    pub model: String,
}

/// Recency filter accepted by the search collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TimeFilter {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "year")]
    Year,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeFilter {
    /// Value for Google's `dateRestrict` parameter; `None` means unrestricted.
    pub fn date_restrict(self) -> Option<&'static str> {
        match self {
            TimeFilter::Day => Some("d1"),
            TimeFilter::Week => Some("w1"),
            TimeFilter::Month => Some("m1"),
            TimeFilter::Year => Some("y1"),
            TimeFilter::All => None,
        }
    }
}
