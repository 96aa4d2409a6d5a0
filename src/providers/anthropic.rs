// src/providers/anthropic.rs
//! Anthropic Messages API.

use serde::{Deserialize, Serialize};

use super::{non_empty_text, LlmProvider, ModelHandle, ProviderError, SYSTEM_INSTRUCTION};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

pub struct AnthropicProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicProvider {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesReq<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResp {
    #[serde(default)]
    content: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(prompt: &'a str, model: &'a ModelHandle) -> MessagesReq<'a> {
    MessagesReq {
        model: &model.api_model,
        max_tokens: model.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: SYSTEM_INSTRUCTION,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
    }
}

fn response_text(resp: MessagesResp) -> Result<String, ProviderError> {
    let parts = resp
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect();
    non_empty_text("anthropic", parts)
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, prompt: &str, model: &ModelHandle) -> Result<String, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing ANTHROPIC_API_KEY".into()))?;

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&build_request(prompt, model))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("anthropic", &e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::from_status("anthropic", status));
        }
        let body: MessagesResp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("anthropic bad json: {e}")))?;
        response_text(body)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
