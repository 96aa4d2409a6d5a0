// tests/report_pipeline.rs
//
// End-to-end report runs over real sockets: the readability service and the
// Gemini endpoint are local axum stubs, everything else is production wiring.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use deep_report::acquire::ContentAcquisitionPipeline;
use deep_report::bootstrap::build_dispatcher;
use deep_report::config::AppConfig;
use deep_report::fetch::{ReaderFetcher, DynFetcher};
use deep_report::progress::{ProgressEvent, ProgressSink, Stage};
use deep_report::rate_limit::RateLimiter;
use deep_report::{ErrorKind, GenerationRequest, ReportOrchestrator, Source};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Reader stub: URLs containing `missing` are 404, others echo a page body.
async fn spawn_reader() -> String {
    let app = Router::new().route(
        "/{*target}",
        get(|Path(target): Path<String>| async move {
            if target.contains("missing") {
                (StatusCode::NOT_FOUND, String::new()).into_response()
            } else {
                format!("Article body for {target}").into_response()
            }
        }),
    );
    serve(app).await
}

/// Gemini stub: fails with 503 `failures` times, then returns a fenced report.
async fn spawn_gemini(failures: u32, calls: Arc<AtomicU32>) -> String {
    let app = Router::new()
        .route(
            "/v1beta/models/{model}",
            post(
                |State((calls, failures)): State<(Arc<AtomicU32>, u32)>,
                 Path(model): Path<String>,
                 Json(req): Json<Value>| async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= failures {
                        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))).into_response();
                    }
                    let prompt = req["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
                    let text = format!(
                        "Report below.\n```json\n{}\n```",
                        json!({
                            "title": model,
                            "summary": format!("prompt had {} source blocks", prompt.matches("[Source ").count()),
                            "sections": [{"title": "One", "content": "Body"}]
                        })
                    );
                    Json(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})).into_response()
                },
            ),
        )
        .with_state((calls, failures));
    serve(app).await
}

fn config(gemini_base: String, reader_base: String) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.fetch.reader_base_url = reader_base;
    let google = cfg.platforms.get_mut("google").unwrap();
    google.base_url = Some(gemini_base);
    google.retry.delay_secs = 0;
    cfg
}

fn orchestrator(cfg: AppConfig) -> ReportOrchestrator {
    std::env::set_var("GEMINI_API_KEY", "test-key");
    let http = reqwest::Client::new();
    let fetcher: DynFetcher = Arc::new(ReaderFetcher::new(
        http.clone(),
        cfg.fetch.reader_base_url.clone(),
        Duration::from_secs(5),
    ));
    let dispatcher = build_dispatcher(&cfg, &http);
    ReportOrchestrator::new(
        Arc::new(cfg),
        RateLimiter::disabled(),
        ContentAcquisitionPipeline::new(fetcher),
        dispatcher,
    )
}

fn request() -> GenerationRequest {
    GenerationRequest {
        sources: vec![
            Source::from_search(7, "https://news.example/a", "A", "snippet a"),
            Source::from_search(7, "https://news.example/missing", "B", "snippet b"),
            Source::custom("https://blog.example/c").unwrap(),
        ],
        acquired_content: Vec::new(),
        prompt: "Summarise the coverage".into(),
        platform: "google".into(),
        model: "gemini-flash".into(),
    }
}

#[tokio::test]
async fn transient_gemini_errors_are_retried_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let gemini = spawn_gemini(2, calls.clone()).await;
    let reader = spawn_reader().await;
    let o = orchestrator(config(gemini, reader));

    let req = request();
    let expected_sources = req.sources.clone();
    let (sink, mut rx) = ProgressSink::channel();
    let out = o.run(req, &sink).await.expect("report");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(out.report.title, "gemini-2.0-flash-exp:generateContent");
    assert_eq!(out.report.summary, "prompt had 3 source blocks");
    assert_eq!(out.report.sources, expected_sources);
    assert_eq!(out.acquisition.successful, 2);
    assert_eq!(out.acquisition.fallback, 1);

    let mut processed = 0;
    let mut last_stage = None;
    while let Ok(ev) = rx.try_recv() {
        match ev {
            ProgressEvent::SourceProcessed { .. } => processed += 1,
            ProgressEvent::StageEntered(s) => last_stage = Some(s),
        }
    }
    assert_eq!(processed, 3);
    assert_eq!(last_stage, Some(Stage::Done));
}

#[tokio::test]
async fn persistent_gemini_outage_is_generation_failed_after_three_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let gemini = spawn_gemini(u32::MAX, calls.clone()).await;
    let reader = spawn_reader().await;
    let o = orchestrator(config(gemini, reader));

    let err = o.run(request(), &ProgressSink::none()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationFailed);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let msg = err.to_string();
    assert!(msg.contains("google"), "{msg}");
    assert!(msg.contains("gemini-flash"), "{msg}");
}
