// src/error.rs
//! Error taxonomy surfaced by the orchestration entry point.

use serde::Serialize;

use crate::extract::ExtractionError;
use crate::providers::{GenerationError, RegistryError};
use crate::rate_limit::RateLimitError;

/// Machine-distinguishable error kind carried by every failed run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    RateLimited,
    NoUsableContent,
    GenerationFailed,
    InvalidReportFormat,
    Timeout,
    /// Search or content-extraction collaborator failed outside a report run.
    UpstreamFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NoUsableContent => "no_usable_content",
            ErrorKind::GenerationFailed => "generation_failed",
            ErrorKind::InvalidReportFormat => "invalid_report_format",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UpstreamFailed => "upstream_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Coarse status class used by transports to pick a response code.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    BadInput,
    RateLimited,
    Upstream,
    Timeout,
    Internal,
}

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("rate limited ({class}): too many requests, please try again later")]
    RateLimited { class: &'static str },
    #[error("failed to fetch usable content for any of the {total} selected sources")]
    NoUsableContent { total: usize },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("invalid report format: {0}")]
    InvalidReportFormat(#[from] ExtractionError),
    #[error("report generation exceeded the {after_secs}s deadline")]
    Timeout { after_secs: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::BadRequest(_) => ErrorKind::BadRequest,
            ReportError::RateLimited { .. } => ErrorKind::RateLimited,
            ReportError::NoUsableContent { .. } => ErrorKind::NoUsableContent,
            // Resolution happens in the Generating step.
            ReportError::Registry(_) | ReportError::Generation(_) => ErrorKind::GenerationFailed,
            ReportError::InvalidReportFormat(_) => ErrorKind::InvalidReportFormat,
            ReportError::Timeout { .. } => ErrorKind::Timeout,
            ReportError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_class(&self) -> StatusClass {
        match self {
            ReportError::BadRequest(_) | ReportError::Registry(_) => StatusClass::BadInput,
            ReportError::RateLimited { .. } => StatusClass::RateLimited,
            ReportError::NoUsableContent { .. }
            | ReportError::Generation(_)
            | ReportError::InvalidReportFormat(_) => StatusClass::Upstream,
            ReportError::Timeout { .. } => StatusClass::Timeout,
            ReportError::Internal(_) => StatusClass::Internal,
        }
    }
}

impl From<RateLimitError> for ReportError {
    fn from(e: RateLimitError) -> Self {
        ReportError::Internal(e.to_string())
    }
}

/// Wire shape of a failed run: `{kind, message}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ReportError> for ErrorBody {
    fn from(e: &ReportError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
