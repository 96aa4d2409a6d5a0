// src/providers/openai.rs
//! Chat Completions adapter. OpenAI and DeepSeek speak the same wire format, so one
//! client serves both with a different base URL and label.

use serde::{Deserialize, Serialize};

use super::{non_empty_text, LlmProvider, ModelHandle, ProviderError, SYSTEM_INSTRUCTION};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    name: &'static str,
    key_var: &'static str,
}

impl OpenAiProvider {
    pub fn openai(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            name: "openai",
            key_var: "OPENAI_API_KEY",
        }
    }

    pub fn deepseek(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            name: "deepseek",
            key_var: "DEEPSEEK_API_KEY",
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: RespMessage,
}

#[derive(Debug, Deserialize)]
struct RespMessage {
    #[serde(default)]
    content: Option<String>,
}

/// o1-family reasoning models reject system messages and `max_tokens`.
fn is_reasoning_model(api_model: &str) -> bool {
    api_model.starts_with("o1")
}

fn build_request<'a>(prompt: &'a str, model: &'a ModelHandle) -> ChatReq<'a> {
    if is_reasoning_model(&model.api_model) {
        ChatReq {
            model: &model.api_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: None,
            max_completion_tokens: model.max_output_tokens,
        }
    } else {
        ChatReq {
            model: &model.api_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: model.max_output_tokens,
            max_completion_tokens: None,
        }
    }
}

fn response_text(provider: &str, resp: ChatResp) -> Result<String, ProviderError> {
    let parts = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .into_iter()
        .collect();
    non_empty_text(provider, parts)
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, model: &ModelHandle) -> Result<String, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured(format!("missing {}", self.key_var)))?;

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(key)
            .json(&build_request(prompt, model))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.name, &e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(self.name, status));
        }
        let body: ChatResp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("{} bad json: {e}", self.name)))?;
        response_text(self.name, body)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
