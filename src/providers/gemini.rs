// src/providers/gemini.rs
//! Google Generative Language API (`models/{model}:generateContent`).

use serde::{Deserialize, Serialize};

use super::{non_empty_text, LlmProvider, ModelHandle, ProviderError, SYSTEM_INSTRUCTION};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self, api_model: &str) -> String {
        format!(
            "{}/v1beta/models/{api_model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReq<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Deserialize)]
struct GenerateResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<RespContent>,
}

#[derive(Debug, Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Debug, Deserialize)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(prompt: &'a str, model: &ModelHandle) -> GenerateReq<'a> {
    GenerateReq {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: prompt }],
        }],
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_INSTRUCTION,
            }],
        },
        generation_config: GenerationConfig {
            temperature: 1.0,
            max_output_tokens: model.max_output_tokens.unwrap_or(8192),
            response_mime_type: "application/json",
        },
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|c| SafetySetting {
                category: c,
                threshold: "BLOCK_NONE",
            })
            .collect(),
    }
}

fn response_text(resp: GenerateResp) -> Result<String, ProviderError> {
    // candidates[0].content.parts[*].text
    let parts = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    non_empty_text("gemini", parts)
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, prompt: &str, model: &ModelHandle) -> Result<String, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing GEMINI_API_KEY".into()))?;

        let resp = self
            .http
            .post(self.endpoint(&model.api_model))
            .query(&[("key", key)])
            .json(&build_request(prompt, model))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("gemini", &e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::from_status("gemini", status));
        }
        let body: GenerateResp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("gemini bad json: {e}")))?;
        response_text(body)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
