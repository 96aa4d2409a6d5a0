// src/providers/mock.rs
use super::{LlmProvider, ModelHandle, ProviderError};

/// Deterministic provider for tests and local runs (`AI_TEST_MODE=mock`).
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

impl MockProvider {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
        }
    }

    /// A well-formed report payload.
    pub fn canned() -> Self {
        Self::new(
            r#"{"title":"Mock report","summary":"Generated without calling a provider.","sections":[{"title":"Overview","content":"This report was produced by the mock provider."}]}"#,
        )
    }
}

pub fn mock_mode() -> bool {
    std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn generate(&self, _prompt: &str, _model: &ModelHandle) -> Result<String, ProviderError> {
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
