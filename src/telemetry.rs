// src/telemetry.rs
//! Tracing setup and log-safe identifiers.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "REPORT_LOG_JSON";
pub const ENV_DEV_LOG: &str = "REPORT_DEV_LOG";
const DEFAULT_FILTER: &str = "deep_report=info,warn";

/// Whether to install our own subscriber. The Shuttle runtime installs its
/// subscriber before `main` runs, so on the platform logs go through it and
/// `RUST_LOG` / `REPORT_LOG_JSON` are ignored. Locally, `REPORT_DEV_LOG=1` in a
/// dev environment (debug build or `SHUTTLE_ENV` in local/development/dev)
/// opts in to ours.
pub fn dev_tracing_requested() -> bool {
    dev_tracing_enabled(
        std::env::var(ENV_DEV_LOG).ok().as_deref(),
        std::env::var("SHUTTLE_ENV").ok().as_deref(),
        cfg!(debug_assertions),
    )
}

fn dev_tracing_enabled(dev_flag: Option<&str>, shuttle_env: Option<&str>, debug_build: bool) -> bool {
    let is_dev_env = debug_build
        || matches!(
            shuttle_env.unwrap_or_default().to_ascii_lowercase().as_str(),
            "local" | "development" | "dev"
        );
    dev_flag == Some("1") && is_dev_env
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `REPORT_LOG_JSON=1` switches to JSON lines. Returns false when another
/// subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::warn!("tracing subscriber already installed, {ENV_LOG_JSON} and RUST_LOG not applied");
        return false;
    }
    true
}

/// Short SHA-256 prefix for logging URLs and queries without leaking them.
pub fn short_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
