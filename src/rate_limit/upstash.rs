// src/rate_limit/upstash.rs
//! Redis-backed store over the Upstash REST API. Shared by every process that points
//! at the same database; the check-and-record step runs as one Lua script server-side.

use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{CounterStore, RateLimitError};

const SLIDING_WINDOW_LUA: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count < limit then
  redis.call('ZADD', key, now, ARGV[4])
  redis.call('PEXPIRE', key, window)
  return 1
end
return 0
"#;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub struct UpstashCounterStore {
    http: reqwest::Client,
    url: String,
    token: String,
    seq: AtomicU64,
}

impl UpstashCounterStore {
    pub fn new(http: reqwest::Client, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            token: token.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// Reads `UPSTASH_REDIS_REST_URL` / `UPSTASH_REDIS_REST_TOKEN`.
    pub fn from_env(http: reqwest::Client) -> anyhow::Result<Self> {
        let url = env("UPSTASH_REDIS_REST_URL")
            .ok_or_else(|| anyhow::anyhow!("Missing UPSTASH_REDIS_REST_URL env var"))?;
        let token = env("UPSTASH_REDIS_REST_TOKEN")
            .ok_or_else(|| anyhow::anyhow!("Missing UPSTASH_REDIS_REST_TOKEN env var"))?;
        Ok(Self::new(http, url, token))
    }

    /// Unique sorted-set member so simultaneous hits at the same ms are all counted.
    fn member(&self, now_ms: u64) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{now_ms}-{}-{n}", std::process::id())
    }
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

fn admitted_from_reply(reply: RestReply) -> Result<bool, RateLimitError> {
    if let Some(e) = reply.error {
        return Err(RateLimitError::Store(format!("upstash: {e}")));
    }
    match reply.result {
        Some(v) => Ok(v.as_i64() == Some(1)),
        None => Err(RateLimitError::Store("upstash: empty reply".into())),
    }
}

#[async_trait::async_trait]
impl CounterStore for UpstashCounterStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<bool, RateLimitError> {
        let cmd = serde_json::json!([
            "EVAL",
            SLIDING_WINDOW_LUA,
            "1",
            key,
            now_ms.to_string(),
            window_ms.to_string(),
            limit.to_string(),
            self.member(now_ms),
        ]);
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(5))
            .json(&cmd)
            .send()
            .await
            .map_err(|e| RateLimitError::Store(e.to_string()))?;
        let status = resp.status();
        let reply: RestReply = resp
            .json()
            .await
            .map_err(|e| RateLimitError::Store(format!("upstash HTTP {status}: {e}")))?;
        admitted_from_reply(reply)
    }

    fn name(&self) -> &'static str {
        "upstash"
    }
}
