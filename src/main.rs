//! Report service binary entrypoint
//! Boots the Axum HTTP server: config, shared state, routes and `/metrics`.

use std::sync::Arc;

use deep_report::{bootstrap, config, metrics::Metrics, telemetry};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    // Shuttle installs its own subscriber; ours is opt-in for local runs.
    if telemetry::dev_tracing_requested() {
        telemetry::init_tracing();
    }

    let cfg = Arc::new(config::load_default()?);
    let metrics = Metrics::init(&cfg)?;
    let state = bootstrap::build_state(cfg)?;

    let router = deep_report::router(state).merge(metrics.router());
    Ok(router.into())
}
