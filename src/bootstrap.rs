// src/bootstrap.rs
//! Wires config, counter store, fetchers, search and providers into [`AppState`].

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::acquire::ContentAcquisitionPipeline;
use crate::api::AppState;
use crate::config::{AppConfig, StoreKind};
use crate::fetch::{DynFetcher, RateLimitedFetcher, ReaderFetcher};
use crate::orchestrator::ReportOrchestrator;
use crate::providers::{
    build_adapter, mock::mock_mode, DynProvider, GenerationDispatcher, MockProvider, Platform,
};
use crate::rate_limit::{
    CounterStore, FileCounterStore, MemoryCounterStore, OpClass, RateLimiter, UpstashCounterStore,
};
use crate::search::{DynSearch, GoogleSearchClient};

const USER_AGENT: &str = concat!("deep-report/", env!("CARGO_PKG_VERSION"));

fn build_store(config: &AppConfig, http: &reqwest::Client) -> anyhow::Result<Arc<dyn CounterStore>> {
    let store: Arc<dyn CounterStore> = match config.rate_limits.store {
        StoreKind::Memory => Arc::new(MemoryCounterStore::default()),
        StoreKind::File => Arc::new(
            FileCounterStore::open(&config.rate_limits.file_path).with_context(|| {
                format!("opening counter store {}", config.rate_limits.file_path.display())
            })?,
        ),
        StoreKind::Upstash => Arc::new(UpstashCounterStore::from_env(http.clone())?),
    };
    Ok(store)
}

/// One adapter per configured platform. `AI_TEST_MODE=mock` swaps every adapter for
/// the canned mock so the service runs without provider keys.
pub fn build_dispatcher(config: &AppConfig, http: &reqwest::Client) -> GenerationDispatcher {
    let mock = mock_mode();
    let mut dispatcher = GenerationDispatcher::new();
    for (name, pcfg) in &config.platforms {
        let Some(platform) = Platform::parse(name) else {
            continue;
        };
        let adapter: DynProvider = if mock {
            Arc::new(MockProvider::canned())
        } else {
            build_adapter(platform, http.clone(), pcfg.base_url.clone())
        };
        dispatcher = dispatcher.with_adapter(platform, adapter);
    }
    dispatcher
}

pub fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("building HTTP client")?;

    let store = build_store(&config, &http)?;
    let limiter = RateLimiter::new(config.rate_limits.enabled, store.clone());

    let reader = ReaderFetcher::new(
        http.clone(),
        config.fetch.reader_base_url.clone(),
        Duration::from_secs(config.fetch.timeout_secs),
    );
    let fetcher: DynFetcher = Arc::new(RateLimitedFetcher::new(
        reader,
        limiter.clone(),
        config.rate_limits.limit_for(OpClass::ContentFetch),
    ));

    let dispatcher = build_dispatcher(&config, &http);
    let search: DynSearch = Arc::new(GoogleSearchClient::from_env(http, config.search.clone()));
    let orchestrator = Arc::new(ReportOrchestrator::new(
        config.clone(),
        limiter.clone(),
        ContentAcquisitionPipeline::new(fetcher.clone()),
        dispatcher,
    ));

    info!(
        target: "report",
        rate_limits = config.rate_limits.enabled,
        store = store.name(),
        platforms = config.platforms.len(),
        mock = mock_mode(),
        "app state ready"
    );

    Ok(AppState {
        config,
        limiter,
        search,
        fetcher,
        orchestrator,
    })
}
