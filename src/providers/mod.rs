// src/providers/mod.rs
//! LLM provider abstraction: one capability (`generate(prompt) -> text`) implemented by a
//! closed set of platform adapters, selected at dispatch time by [`Platform`].

pub mod anthropic;
pub mod dispatch;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use dispatch::{GenerationDispatcher, GenerationError};
pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use registry::{ModelListing, ProviderRegistry, RegistryError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared system instruction for every adapter.
pub const SYSTEM_INSTRUCTION: &str = "You are a meticulous research analyst. You write structured reports grounded only in the supplied sources. Respond with a single JSON object and nothing else.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Google,
    OpenAi,
    Anthropic,
    DeepSeek,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Google,
        Platform::OpenAi,
        Platform::Anthropic,
        Platform::DeepSeek,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Some(Platform::Google),
            "openai" => Some(Platform::OpenAi),
            "anthropic" => Some(Platform::Anthropic),
            "deepseek" => Some(Platform::DeepSeek),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Google => "google",
            Platform::OpenAi => "openai",
            Platform::Anthropic => "anthropic",
            Platform::DeepSeek => "deepseek",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which provider errors a retry loop may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryOn {
    /// Only rate/overload/timeout signals.
    #[default]
    Transient,
    /// Every error, including malformed requests.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            retry_on: RetryOn::Transient,
        }
    }

    pub fn should_retry(&self, err: &ProviderError) -> bool {
        match self.retry_on {
            RetryOn::Any => true,
            RetryOn::Transient => err.is_transient(),
        }
    }
}

/// Resolved, callable (platform, model) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub platform: Platform,
    /// Registry identifier, e.g. `gemini-flash`.
    pub model: String,
    /// Identifier sent on the wire, e.g. `gemini-2.0-flash-exp`.
    pub api_model: String,
    pub label: String,
    pub max_output_tokens: Option<u32>,
    pub retry: RetryPolicy,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Rate limit, overload, timeout: worth another attempt.
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("provider error: {0}")]
    Fatal(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// 408/429/5xx are transient; every other non-success status is fatal.
    pub fn from_status(provider: &str, status: reqwest::StatusCode) -> Self {
        let msg = format!("{provider} HTTP {status}");
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            ProviderError::Transient(msg)
        } else {
            ProviderError::Fatal(msg)
        }
    }

    pub fn from_transport(provider: &str, e: &reqwest::Error) -> Self {
        let msg = format!("{provider} request failed: {e}");
        if e.is_timeout() || e.is_connect() {
            ProviderError::Transient(msg)
        } else {
            ProviderError::Fatal(msg)
        }
    }
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, model: &ModelHandle) -> Result<String, ProviderError>;
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn LlmProvider>;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Build the real adapter for `platform`. Keys come from the environment; a missing key
/// only fails when the adapter is actually called.
pub fn build_adapter(
    platform: Platform,
    http: reqwest::Client,
    base_url: Option<String>,
) -> DynProvider {
    match platform {
        Platform::Google => Arc::new(GeminiProvider::new(
            http,
            base_url.unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            env("GEMINI_API_KEY"),
        )),
        Platform::OpenAi => Arc::new(OpenAiProvider::openai(
            http,
            base_url.unwrap_or_else(|| openai::OPENAI_BASE_URL.to_string()),
            env("OPENAI_API_KEY"),
        )),
        Platform::Anthropic => Arc::new(AnthropicProvider::new(
            http,
            base_url.unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string()),
            env("ANTHROPIC_API_KEY"),
        )),
        Platform::DeepSeek => Arc::new(OpenAiProvider::deepseek(
            http,
            base_url.unwrap_or_else(|| openai::DEEPSEEK_BASE_URL.to_string()),
            env("DEEPSEEK_API_KEY"),
        )),
    }
}

/// Join non-empty text fragments and reject all-whitespace output.
pub(crate) fn non_empty_text(provider: &str, parts: Vec<String>) -> Result<String, ProviderError> {
    let out = parts.concat();
    if out.trim().is_empty() {
        Err(ProviderError::Fatal(format!("{provider} returned empty output")))
    } else {
        Ok(out)
    }
}
