// src/api.rs
use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::error::{ErrorBody, ErrorKind, ReportError, StatusClass};
use crate::fetch::{DynFetcher, FetchError};
use crate::orchestrator::{ReportOrchestrator, ReportOutcome};
use crate::progress::ProgressSink;
use crate::providers::{registry::split_selector, ModelListing};
use crate::rate_limit::{OpClass, RateLimiter};
use crate::search::{DynSearch, SearchError};
use crate::telemetry::short_hash;
use crate::types::{AcquiredContent, GenerationRequest, Source, TimeFilter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub limiter: RateLimiter,
    pub search: DynSearch,
    /// Already wrapped with per-URL admission control.
    pub fetcher: DynFetcher,
    pub orchestrator: Arc<ReportOrchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/search", post(search))
        .route("/api/fetch-content", post(fetch_content))
        .route("/api/report", post(report))
        .route("/api/models", get(models))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `{kind, message}` with a status code derived from the failure class.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                kind,
                message: message.into(),
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::BadRequest, message)
    }

    fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::RateLimited,
            "Too many requests. Please wait a moment before trying again.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn status_for(class: StatusClass) -> StatusCode {
    match class {
        StatusClass::BadInput => StatusCode::BAD_REQUEST,
        StatusClass::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        StatusClass::Upstream => StatusCode::BAD_GATEWAY,
        StatusClass::Timeout => StatusCode::GATEWAY_TIMEOUT,
        StatusClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        Self {
            status: status_for(e.status_class()),
            body: ErrorBody::from(&e),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let (status, kind) = match &e {
            SearchError::NotConfigured => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal),
            SearchError::QuotaExceeded => (StatusCode::FORBIDDEN, ErrorKind::RateLimited),
            SearchError::Upstream { .. } | SearchError::Transport(_) => {
                (StatusCode::BAD_GATEWAY, ErrorKind::UpstreamFailed)
            }
        };
        Self::new(status, kind, e.to_string())
    }
}

/// Malformed or mistyped bodies are bad input, reported in the same envelope.
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::RateLimited => Self::rate_limited(),
            FetchError::Failed(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                ErrorKind::UpstreamFailed,
                "Failed to fetch content",
            ),
            FetchError::Internal(msg) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, msg)
            }
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchReq {
    #[serde(default)]
    query: String,
    #[serde(default)]
    time_filter: TimeFilter,
}

async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchReq>, JsonRejection>,
) -> Result<Json<Vec<Source>>, ApiError> {
    let Json(body) = body?;
    let query = body.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Query parameter is required"));
    }
    let limit = state.config.rate_limits.limit_for(OpClass::Search);
    let admission = state
        .limiter
        .allow_class(OpClass::Search, Some(query), limit)
        .await
        .map_err(ReportError::from)?;
    if !admission.is_admitted() {
        return Err(ApiError::rate_limited());
    }
    tracing::info!(target: "api", query = %short_hash(query), filter = ?body.time_filter, "search");
    let results = state.search.search(query, body.time_filter).await?;
    Ok(Json(results))
}

#[derive(serde::Deserialize)]
struct FetchReq {
    #[serde(default)]
    url: String,
}

#[derive(serde::Serialize)]
struct FetchResp {
    content: String,
}

async fn fetch_content(
    State(state): State<AppState>,
    body: Result<Json<FetchReq>, JsonRejection>,
) -> Result<Json<FetchResp>, ApiError> {
    let Json(body) = body?;
    let url = body.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }
    let content = state.fetcher.fetch(url).await?;
    Ok(Json(FetchResp { content }))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportReq {
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    acquired_content: Vec<AcquiredContent>,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    platform: String,
    #[serde(default)]
    model: String,
    /// Older clients send `<platform>__<model>` instead of the two fields.
    #[serde(default)]
    platform_model: Option<String>,
}

impl ReportReq {
    fn into_request(self) -> Result<GenerationRequest, ApiError> {
        let (platform, model) = match (self.platform.trim().is_empty(), &self.platform_model) {
            (true, Some(sel)) => {
                let (p, m) = split_selector(sel.trim()).ok_or_else(|| {
                    ApiError::bad_request(format!("invalid platformModel selector '{sel}'"))
                })?;
                (p.to_string(), m.to_string())
            }
            _ => (self.platform, self.model),
        };
        Ok(GenerationRequest {
            sources: self.sources,
            acquired_content: self.acquired_content,
            prompt: self.prompt,
            platform,
            model,
        })
    }
}

async fn report(
    State(state): State<AppState>,
    body: Result<Json<ReportReq>, JsonRejection>,
) -> Result<Json<ReportOutcome>, ApiError> {
    let Json(body) = body?;
    let req = body.into_request()?;
    tracing::info!(
        target: "api",
        sources = req.sources.len(),
        supplied = req.acquired_content.len(),
        platform = %req.platform,
        model = %req.model,
        "report requested"
    );
    let out = state.orchestrator.run(req, &ProgressSink::none()).await?;
    Ok(Json(out))
}

async fn models(State(state): State<AppState>) -> Json<Vec<ModelListing>> {
    Json(state.orchestrator.registry().list())
}
