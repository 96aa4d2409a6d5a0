// src/config/app.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::{Platform, RetryOn, RetryPolicy};
use crate::rate_limit::{LimitConfig, OpClass};

fn default_window_secs() -> u64 {
    60
}
fn default_deadline_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

/// Process-wide configuration. Loaded once at start and shared behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Operational ceiling for one orchestration run.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_platforms")]
    pub platforms: BTreeMap<String, PlatformConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitsConfig::default(),
            search: SearchConfig::default(),
            fetch: FetchConfig::default(),
            prompt: PromptConfig::default(),
            deadline_secs: default_deadline_secs(),
            platforms: default_platforms(),
        }
    }
}

impl AppConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.deadline_secs == 0 {
            anyhow::bail!("deadline_secs must be > 0");
        }
        if self.search.max_selectable_results == 0 {
            anyhow::bail!("search.max_selectable_results must be > 0");
        }
        for (name, p) in &self.platforms {
            if Platform::parse(name).is_none() {
                anyhow::bail!("unsupported platform in config: {name}");
            }
            if p.retry.max_attempts == 0 {
                anyhow::bail!("platforms.{name}.retry.max_attempts must be >= 1");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
    Upstash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    /// When false every admission check passes without touching the store.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "default_counter_path")]
    pub file_path: PathBuf,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    pub search: u32,
    pub content_fetch: u32,
    pub report_generation: u32,
}

fn default_counter_path() -> PathBuf {
    PathBuf::from("cache/ratelimit.json")
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: StoreKind::Memory,
            file_path: default_counter_path(),
            window_secs: default_window_secs(),
            search: 5,
            content_fetch: 10,
            report_generation: 2,
        }
    }
}

impl RateLimitsConfig {
    pub fn limit_for(&self, class: OpClass) -> LimitConfig {
        let limit = match class {
            OpClass::Search => self.search,
            OpClass::ContentFetch => self.content_fetch,
            OpClass::ReportGeneration => self.report_generation,
        };
        LimitConfig {
            limit,
            window_secs: self.window_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub results_per_page: u32,
    pub max_selectable_results: usize,
    pub safe_search: String,
    pub market: String,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
}

fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_per_page: 10,
            max_selectable_results: 10,
            safe_search: "moderate".to_string(),
            market: "en-US".to_string(),
            endpoint: default_search_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub reader_base_url: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            reader_base_url: "https://r.jina.ai".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub max_chars_per_source: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars_per_source: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
    #[serde(default)]
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_secs: 0,
            retry_on: RetryOn::Transient,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_secs(self.delay_secs),
            retry_on: self.retry_on,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub enabled: bool,
    /// Override of the provider endpoint (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub label: String,
    /// Identifier sent to the provider API.
    pub api_model: String,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

fn model(enabled: bool, label: &str, api_model: &str, max_tokens: u32) -> ModelConfig {
    ModelConfig {
        enabled,
        label: label.to_string(),
        api_model: api_model.to_string(),
        max_output_tokens: Some(max_tokens),
    }
}

fn models(entries: Vec<(&str, ModelConfig)>) -> BTreeMap<String, ModelConfig> {
    entries
        .into_iter()
        .map(|(id, m)| (id.to_string(), m))
        .collect()
}

/// Built-in platform table: only Gemini Flash variants are on by default.
pub fn default_platforms() -> BTreeMap<String, PlatformConfig> {
    let mut out = BTreeMap::new();
    out.insert(
        "google".to_string(),
        PlatformConfig {
            enabled: true,
            base_url: None,
            retry: RetryConfig {
                max_attempts: 3,
                delay_secs: 60,
                retry_on: RetryOn::Transient,
            },
            models: models(vec![
                ("gemini-flash", model(true, "Gemini Flash", "gemini-2.0-flash-exp", 8192)),
                (
                    "gemini-flash-thinking",
                    model(
                        true,
                        "Gemini Flash Thinking",
                        "gemini-2.0-flash-thinking-exp-01-21",
                        8192,
                    ),
                ),
                ("gemini-exp", model(false, "Gemini Exp", "gemini-exp-1206", 8192)),
            ]),
        },
    );
    out.insert(
        "openai".to_string(),
        PlatformConfig {
            enabled: false,
            base_url: None,
            retry: RetryConfig::default(),
            models: models(vec![
                ("gpt-4o", model(false, "GPT-4o", "gpt-4o", 4096)),
                ("o1-mini", model(false, "o1-mini", "o1-mini", 8192)),
                ("o1", model(false, "o1", "o1", 8192)),
            ]),
        },
    );
    out.insert(
        "anthropic".to_string(),
        PlatformConfig {
            enabled: false,
            base_url: None,
            retry: RetryConfig::default(),
            models: models(vec![
                (
                    "sonnet-3.5",
                    model(false, "Claude 3 Sonnet", "claude-3-5-sonnet-latest", 8192),
                ),
                (
                    "haiku-3.5",
                    model(false, "Claude 3 Haiku", "claude-3-5-haiku-latest", 8192),
                ),
            ]),
        },
    );
    out.insert(
        "deepseek".to_string(),
        PlatformConfig {
            enabled: false,
            base_url: None,
            retry: RetryConfig::default(),
            models: models(vec![
                ("chat", model(false, "Chat", "deepseek-chat", 8192)),
                ("reasoner", model(false, "Reasoner", "deepseek-reasoner", 8192)),
            ]),
        },
    );
    out
}
