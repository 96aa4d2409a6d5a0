// src/providers/dispatch.rs
//! Routes a prompt to the adapter for the handle's platform and applies the handle's
//! retry policy. No retry state outlives a single call.

use metrics::counter;
use std::collections::HashMap;
use tokio::time::sleep;

use super::{DynProvider, ModelHandle, Platform, ProviderError, RetryPolicy};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("{platform}/{model}: provider exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        platform: Platform,
        model: String,
        attempts: u32,
        last_error: String,
    },
    #[error("{platform}/{model}: generation failed: {error}")]
    Failed {
        platform: Platform,
        model: String,
        error: ProviderError,
    },
    #[error("{platform}: no provider adapter registered")]
    NotConfigured { platform: Platform },
}

#[derive(Clone, Default)]
pub struct GenerationDispatcher {
    adapters: HashMap<Platform, DynProvider>,
}

impl GenerationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, platform: Platform, adapter: DynProvider) -> Self {
        self.adapters.insert(platform, adapter);
        self
    }

    /// Generate with the retry policy configured for the handle's platform.
    pub async fn generate(&self, prompt: &str, handle: &ModelHandle) -> Result<String, GenerationError> {
        self.generate_with_policy(prompt, handle, handle.retry).await
    }

    pub async fn generate_with_policy(
        &self,
        prompt: &str,
        handle: &ModelHandle,
        policy: RetryPolicy,
    ) -> Result<String, GenerationError> {
        let adapter = self
            .adapters
            .get(&handle.platform)
            .ok_or(GenerationError::NotConfigured {
                platform: handle.platform,
            })?;
        let max_attempts = policy.max_attempts.max(1);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            counter!("provider_attempts_total", "platform" => handle.platform.as_str()).increment(1);

            let err = match adapter.generate(prompt, handle).await {
                Ok(text) => {
                    tracing::info!(
                        target: "provider",
                        platform = %handle.platform,
                        model = %handle.model,
                        attempt,
                        chars = text.len(),
                        "generation ok"
                    );
                    return Ok(text);
                }
                Err(e) => e,
            };

            let retryable = policy.should_retry(&err);
            if retryable && attempt < max_attempts {
                tracing::warn!(
                    target: "provider",
                    platform = %handle.platform,
                    model = %handle.model,
                    attempt,
                    max_attempts,
                    delay_secs = policy.delay.as_secs(),
                    error = %err,
                    "generation failed, retrying"
                );
                sleep(policy.delay).await;
                continue;
            }

            tracing::warn!(
                target: "provider",
                platform = %handle.platform,
                model = %handle.model,
                attempt,
                error = %err,
                "generation failed"
            );
            if retryable && max_attempts > 1 {
                return Err(GenerationError::Exhausted {
                    platform: handle.platform,
                    model: handle.model.clone(),
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }
            return Err(GenerationError::Failed {
                platform: handle.platform,
                model: handle.model.clone(),
                error: err,
            });
        }
    }
}
