// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with the
// search, fetch and provider collaborators replaced by in-process stubs.

use std::sync::Arc;

use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use deep_report::acquire::ContentAcquisitionPipeline;
use deep_report::config::AppConfig;
use deep_report::fetch::{ContentFetcher, DynFetcher, FetchError, RateLimitedFetcher};
use deep_report::providers::{GenerationDispatcher, MockProvider, Platform};
use deep_report::rate_limit::{MemoryCounterStore, OpClass, RateLimiter};
use deep_report::search::{SearchError, SearchProvider};
use deep_report::types::{Source, TimeFilter};
use deep_report::{api, AppState, ReportOrchestrator};

const BODY_LIMIT: usize = 1024 * 1024;

const REPLY: &str = r#"```json
{"title":"Rust async runtimes","summary":"Tokio dominates.","sections":[{"title":"Landscape","content":"[Source 1] covers it."}],"sources":[{"id":"model-made","url":"https://invented.example","name":"x"}]}
```"#;

struct StubSearch;

#[async_trait::async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str, filter: TimeFilter) -> Result<Vec<Source>, SearchError> {
        if query == "quota" {
            return Err(SearchError::QuotaExceeded);
        }
        Ok(vec![Source::from_search(
            42,
            "https://tokio.rs",
            &format!("{query} ({})", filter.date_restrict().unwrap_or("all")),
            "Tokio is an async runtime",
        )])
    }
}

/// `down` URLs fail, everything else returns page text.
struct StubFetcher;

#[async_trait::async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if url.contains("down") {
            Err(FetchError::Failed("HTTP 404".into()))
        } else {
            Ok(format!("Full text of {url}"))
        }
    }
    fn name(&self) -> &'static str {
        "stub"
    }
}

fn test_router_with(config: AppConfig, reply: &str) -> Router {
    let config = Arc::new(config);
    let limiter = RateLimiter::new(
        config.rate_limits.enabled,
        Arc::new(MemoryCounterStore::default()),
    );
    let fetcher: DynFetcher = Arc::new(RateLimitedFetcher::new(
        StubFetcher,
        limiter.clone(),
        config.rate_limits.limit_for(OpClass::ContentFetch),
    ));
    let dispatcher = GenerationDispatcher::new()
        .with_adapter(Platform::Google, Arc::new(MockProvider::new(reply)));
    let orchestrator = Arc::new(ReportOrchestrator::new(
        config.clone(),
        limiter.clone(),
        ContentAcquisitionPipeline::new(fetcher.clone()),
        dispatcher,
    ));
    api::router(AppState {
        config,
        limiter,
        search: Arc::new(StubSearch),
        fetcher,
        orchestrator,
    })
}

fn test_router() -> Router {
    test_router_with(AppConfig::default(), REPLY)
}

fn post(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

async fn json_body(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

fn sources() -> Json {
    json!([
        {"id": "search-1-https://a.example", "url": "https://a.example", "name": "A", "snippet": "alpha"},
        {"id": "search-1-https://down.example", "url": "https://down.example", "name": "Down", "snippet": "<b>beta</b> preview"}
    ])
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let resp = test_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "ok");
}

#[tokio::test]
async fn report_keeps_caller_sources_and_reports_acquisition() {
    let payload = json!({
        "sources": sources(),
        "prompt": "Compare async runtimes",
        "platform": "google",
        "model": "gemini-flash"
    });
    let resp = test_router().oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;

    assert_eq!(v["title"], "Rust async runtimes");
    assert_eq!(v["sections"].as_array().unwrap().len(), 1);
    // Model-invented source is discarded.
    assert_eq!(v["sources"], sources());
    assert_eq!(v["acquisition"]["total"], 2);
    assert_eq!(v["acquisition"]["successful"], 1);
    assert_eq!(v["acquisition"]["fallback"], 1);
    assert_eq!(v["acquisition"]["failed"], 0);
    assert_eq!(v["acquisition"]["sourceStatuses"]["https://down.example"], "preview");
    assert_eq!(v["acquisition"]["sourceStatuses"]["https://a.example"], "fetched");
}

#[tokio::test]
async fn report_accepts_legacy_platform_model_selector() {
    let payload = json!({
        "sources": sources(),
        "prompt": "Compare async runtimes",
        "platformModel": "google__gemini-flash"
    });
    let resp = test_router().oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn report_without_prompt_is_400_bad_request() {
    let payload = json!({"sources": sources(), "prompt": "", "platform": "google", "model": "gemini-flash"});
    let resp = test_router().oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert_eq!(v["kind"], "bad_request");
    assert!(v["message"].as_str().unwrap().contains("prompt"));
}

#[tokio::test]
async fn malformed_bodies_use_the_error_envelope() {
    let mistyped = post("/api/report", json!({"sources": "oops", "prompt": "p"}));
    let not_json = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header("content-type", "application/json")
        .body(Body::from("{query:"))
        .unwrap();
    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/fetch-content")
        .body(Body::from(r#"{"url":"https://a.example"}"#))
        .unwrap();

    for req in [mistyped, not_json, no_content_type] {
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = json_body(resp).await;
        assert_eq!(v["kind"], "bad_request");
        assert!(!v["message"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn report_with_disabled_model_names_it() {
    let payload = json!({"sources": sources(), "prompt": "p", "platform": "google", "model": "gemini-exp"});
    let resp = test_router().oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert_eq!(v["kind"], "generation_failed");
    assert!(v["message"].as_str().unwrap().contains("gemini-exp"));
}

#[tokio::test]
async fn report_with_prose_reply_is_502_invalid_format() {
    let app = test_router_with(AppConfig::default(), "I'm unable to write that report.");
    let payload = json!({"sources": sources(), "prompt": "p", "platform": "google", "model": "gemini-flash"});
    let resp = app.oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(resp).await["kind"], "invalid_report_format");
}

#[tokio::test]
async fn report_with_nothing_usable_is_502_no_usable_content() {
    let payload = json!({
        "sources": [{"id": "x", "url": "https://down.example", "name": "Down", "snippet": ""}],
        "prompt": "p",
        "platform": "google",
        "model": "gemini-flash"
    });
    let resp = test_router().oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(resp).await["kind"], "no_usable_content");
}

#[tokio::test]
async fn third_report_within_window_is_429() {
    let mut cfg = AppConfig::default();
    cfg.rate_limits.enabled = true;
    let app = test_router_with(cfg, REPLY);
    let payload = json!({"sources": sources(), "prompt": "p", "platform": "google", "model": "gemini-flash"});

    for _ in 0..2 {
        let resp = app.clone().oneshot(post("/api/report", payload.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = app.oneshot(post("/api/report", payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(resp).await["kind"], "rate_limited");
}

#[tokio::test]
async fn models_lists_effective_flags() {
    let resp = test_router()
        .oneshot(Request::get("/api/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    let list = v.as_array().unwrap();
    let find = |value: &str| list.iter().find(|m| m["value"] == value).cloned().unwrap();
    assert_eq!(find("google__gemini-flash")["enabled"], true);
    assert_eq!(find("google__gemini-exp")["enabled"], false);
    assert_eq!(find("deepseek__chat")["enabled"], false);
}

#[tokio::test]
async fn search_maps_time_filter_and_requires_query() {
    let app = test_router();
    let resp = app
        .clone()
        .oneshot(post("/api/search", json!({"query": "tokio", "timeFilter": "24h"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v[0]["name"], "tokio (d1)");
    assert_eq!(v[0]["url"], "https://tokio.rs");

    let resp = app.oneshot(post("/api/search", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_quota_exhaustion_is_403() {
    let resp = test_router()
        .oneshot(post("/api/search", json!({"query": "quota"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn repeated_search_for_same_query_is_rate_limited() {
    let mut cfg = AppConfig::default();
    cfg.rate_limits.enabled = true;
    cfg.rate_limits.search = 1;
    let app = test_router_with(cfg, REPLY);
    let ok = app.clone().oneshot(post("/api/search", json!({"query": "a"}))).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let other = app.clone().oneshot(post("/api/search", json!({"query": "b"}))).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
    let denied = app.oneshot(post("/api/search", json!({"query": "a"}))).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn fetch_content_statuses() {
    let app = test_router();
    let resp = app
        .clone()
        .oneshot(post("/api/fetch-content", json!({"url": "https://a.example"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["content"], "Full text of https://a.example");

    let resp = app
        .clone()
        .oneshot(post("/api/fetch-content", json!({"url": "https://down.example"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let resp = app.oneshot(post("/api/fetch-content", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
