// src/acquire.rs
//! Content acquisition: drives the fetcher over the selected sources, one at a time,
//! substituting the search snippet whenever a fetch fails.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::fetch::{DynFetcher, FetchError};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::telemetry::short_hash;
use crate::types::{AcquiredContent, AcquisitionMode, Source};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "content_fetch_total",
            "Per-source acquisition outcomes by mode (fetched/fallback/failed)."
        );
    });
}

/// Per-URL badge shown next to each source.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Fetched,
    Preview,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionStatus {
    pub total: usize,
    pub successful: usize,
    pub fallback: usize,
    /// Sources that produced no text at all, neither fetched nor from the snippet.
    pub failed: usize,
    pub source_statuses: BTreeMap<String, SourceStatus>,
}

impl AcquisitionStatus {
    /// Count one outcome. Empty content is a failure whatever the mode says.
    fn record(&mut self, mode: AcquisitionMode, content: &str) -> SourceStatus {
        if content.trim().is_empty() {
            self.failed += 1;
            return SourceStatus::Failed;
        }
        match mode {
            AcquisitionMode::Fetched => {
                self.successful += 1;
                SourceStatus::Fetched
            }
            AcquisitionMode::Fallback => {
                self.fallback += 1;
                SourceStatus::Preview
            }
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("content fetch rate limited")]
    RateLimited,
    #[error("no usable content for any of the {total} sources")]
    NoUsableContent { total: usize },
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct Acquired {
    /// One entry per input source, in input order.
    pub contents: Vec<AcquiredContent>,
    pub status: AcquisitionStatus,
}

impl Acquired {
    pub fn usable(&self) -> impl Iterator<Item = &AcquiredContent> {
        self.contents.iter().filter(|c| c.is_usable())
    }
}

pub struct ContentAcquisitionPipeline {
    fetcher: DynFetcher,
}

impl ContentAcquisitionPipeline {
    pub fn new(fetcher: DynFetcher) -> Self {
        Self { fetcher }
    }

    /// Sequential by construction so the running totals and the abort-on-rate-limit
    /// point are deterministic.
    pub async fn acquire(
        &self,
        sources: &[Source],
        progress: &ProgressSink,
    ) -> Result<Acquired, AcquisitionError> {
        ensure_metrics_described();

        let mut status = AcquisitionStatus {
            total: sources.len(),
            ..Default::default()
        };
        let mut contents = Vec::with_capacity(sources.len());

        for (index, src) in sources.iter().enumerate() {
            let title = normalize_snippet(&src.name);
            let (content, mode) = match self.fetcher.fetch(&src.url).await {
                Ok(text) if !text.trim().is_empty() => (text, AcquisitionMode::Fetched),
                Ok(_) => {
                    tracing::warn!(target: "acquire", url = %short_hash(&src.url), "empty extraction, using snippet");
                    (normalize_snippet(&src.snippet), AcquisitionMode::Fallback)
                }
                Err(FetchError::Failed(reason)) => {
                    tracing::warn!(target: "acquire", url = %short_hash(&src.url), %reason, "fetch failed, using snippet");
                    (normalize_snippet(&src.snippet), AcquisitionMode::Fallback)
                }
                Err(FetchError::RateLimited) => {
                    tracing::warn!(target: "acquire", index, "fetch rate limited, aborting acquisition");
                    return Err(AcquisitionError::RateLimited);
                }
                Err(FetchError::Internal(e)) => return Err(AcquisitionError::Internal(e)),
            };

            let badge = status.record(mode, &content);
            status.source_statuses.insert(src.url.clone(), badge);
            let label = match badge {
                SourceStatus::Fetched => "fetched",
                SourceStatus::Preview => "fallback",
                SourceStatus::Failed => "failed",
            };
            counter!("content_fetch_total", "mode" => label).increment(1);

            contents.push(AcquiredContent {
                url: src.url.clone(),
                title,
                content,
                acquisition_mode: mode,
            });
            progress.emit(ProgressEvent::SourceProcessed {
                index,
                url: src.url.clone(),
                mode,
                status: status.clone(),
            });
        }

        let acquired = Acquired { contents, status };
        if acquired.usable().next().is_none() {
            return Err(AcquisitionError::NoUsableContent {
                total: sources.len(),
            });
        }
        tracing::info!(
            target: "acquire",
            total = acquired.status.total,
            successful = acquired.status.successful,
            fallback = acquired.status.fallback,
            failed = acquired.status.failed,
            "acquisition finished"
        );
        Ok(acquired)
    }
}

/// Accept content the caller already acquired. Blank entries are dropped and
/// counted as failed, so `total` is the number of supplied entries.
pub fn from_supplied(supplied: Vec<AcquiredContent>) -> Result<Acquired, AcquisitionError> {
    let total = supplied.len();
    let mut status = AcquisitionStatus {
        total,
        ..Default::default()
    };
    let mut contents = Vec::with_capacity(total);
    for c in supplied {
        let badge = status.record(c.acquisition_mode, &c.content);
        status.source_statuses.insert(c.url.clone(), badge);
        if badge != SourceStatus::Failed {
            contents.push(c);
        }
    }
    if contents.is_empty() {
        return Err(AcquisitionError::NoUsableContent { total });
    }
    Ok(Acquired { contents, status })
}

/// Search snippets arrive as HTML fragments: decode entities, strip tags, collapse whitespace.
pub fn normalize_snippet(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}
