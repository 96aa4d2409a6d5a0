// src/extract.rs
//! Pulls the report object out of a provider's free-form reply.
//!
//! Replies are expected to carry one JSON object, possibly wrapped in prose or a
//! markdown fence. The candidate span runs from the first `{` to the last `}`.

use serde::Deserialize;

use crate::types::{Report, Section, Source};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no JSON object found in model output")]
    NoCandidate,
    #[error("model output is not a valid report object: {0}")]
    MalformedPayload(String),
}

/// Report body as produced by the model. Any `sources` the model adds is ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReportDraft {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub sections: Vec<Section>,
}

impl ReportDraft {
    /// Attach the caller's source list, which is authoritative.
    pub fn into_report(self, sources: Vec<Source>) -> Report {
        Report {
            title: self.title,
            summary: self.summary,
            sections: self.sections,
            sources,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportExtractor;

impl ReportExtractor {
    pub fn extract(&self, raw: &str) -> Result<ReportDraft, ExtractionError> {
        let span = candidate_span(raw).ok_or(ExtractionError::NoCandidate)?;
        serde_json::from_str::<ReportDraft>(span).map_err(|e| {
            tracing::warn!(target: "report", error = %e, span_len = span.len(), "malformed report payload");
            ExtractionError::MalformedPayload(e.to_string())
        })
    }
}

fn candidate_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
