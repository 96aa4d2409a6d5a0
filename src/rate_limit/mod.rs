// src/rate_limit/mod.rs
//! Admission control keyed by operation class.
//!
//! The limiter itself is stateless; all counting happens in a shared [`CounterStore`]
//! which must perform "drop expired, check, record" as one atomic step. Denial is an
//! expected outcome, not an error: only store failures surface as `Err`.

pub mod file;
pub mod memory;
pub mod upstash;

pub use file::FileCounterStore;
pub use memory::MemoryCounterStore;
pub use upstash::UpstashCounterStore;

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::telemetry::short_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Search,
    ContentFetch,
    ReportGeneration,
}

impl OpClass {
    pub fn as_str(self) -> &'static str {
        match self {
            OpClass::Search => "search",
            OpClass::ContentFetch => "fetch",
            OpClass::ReportGeneration => "report",
        }
    }

    /// Store key for this class, optionally narrowed by a further dimension
    /// (query text for search, URL for fetch). Dimensions are hashed to bound key size.
    pub fn key(self, dimension: Option<&str>) -> String {
        match dimension {
            Some(d) => format!("ratelimit:{}:{}", self.as_str(), short_hash(d)),
            None => format!("ratelimit:{}", self.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    pub limit: u32,
    pub window_secs: u64,
}

impl LimitConfig {
    pub fn window_ms(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RateLimitError {
    #[error("counter store unavailable: {0}")]
    Store(String),
}

/// Shared counter primitive behind the limiter.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Drop events for `key` older than `now_ms - window_ms`; if fewer than `limit`
    /// remain, record one at `now_ms` and return `true`. Must be atomic per key.
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<bool, RateLimitError>;

    fn name(&self) -> &'static str;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis() as u64
    }
}

/// Hand-driven clock for deterministic window tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(enabled: bool, store: Arc<dyn CounterStore>) -> Self {
        Self {
            enabled,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Limiter that admits everything.
    pub fn disabled() -> Self {
        Self::new(false, Arc::new(MemoryCounterStore::default()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn allow(&self, key: &str, cfg: LimitConfig) -> Result<Admission, RateLimitError> {
        if !self.enabled {
            return Ok(Admission::Admitted);
        }
        let now = self.clock.now_ms();
        let ok = self
            .store
            .hit(key, cfg.limit, cfg.window_ms(), now)
            .await?;
        if ok {
            Ok(Admission::Admitted)
        } else {
            tracing::info!(target: "ratelimit", key, limit = cfg.limit, store = self.store.name(), "denied");
            counter!("rate_limit_denied_total", "class" => class_label(key)).increment(1);
            Ok(Admission::Denied)
        }
    }

    /// Convenience wrapper: key derived from class + optional dimension.
    pub async fn allow_class(
        &self,
        class: OpClass,
        dimension: Option<&str>,
        cfg: LimitConfig,
    ) -> Result<Admission, RateLimitError> {
        self.allow(&class.key(dimension), cfg).await
    }
}

fn class_label(key: &str) -> String {
    key.split(':').nth(1).unwrap_or("unknown").to_string()
}
