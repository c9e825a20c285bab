//! Ordered Model Fallback
//!
//! Providers retire models without much notice. The client walks an ordered
//! candidate list and only advances when the provider reports the current
//! model as retired; every other failure is surfaced immediately.

use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider};

/// Status code the provider uses for a retired model
const RETIRED_MODEL_STATUS: u16 = 400;

/// Message fragment the provider uses for a retired model
const RETIRED_MODEL_FRAGMENT: &str = "decommissioned";

/// Classify a raw provider answer as "model retired".
pub fn is_model_retired(status: u16, message: &str) -> bool {
    status == RETIRED_MODEL_STATUS && message.to_ascii_lowercase().contains(RETIRED_MODEL_FRAGMENT)
}

/// Chat completion with ordered model fallback
pub struct ModelFallbackClient {
    provider: Arc<dyn LlmProvider>,
    models: Vec<String>,
    options: GenerationOptions,
}

impl ModelFallbackClient {
    /// Create a client over an ordered, non-empty candidate list
    pub fn new(provider: Arc<dyn LlmProvider>, models: Vec<String>) -> Result<Self> {
        Self::with_options(provider, models, GenerationOptions::default())
    }

    /// Create with explicit sampling settings (the model field is ignored)
    pub fn with_options(
        provider: Arc<dyn LlmProvider>,
        models: Vec<String>,
        options: GenerationOptions,
    ) -> Result<Self> {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();

        if models.is_empty() {
            return Err(CoreError::Config("no candidate models configured".into()));
        }

        Ok(Self {
            provider,
            models,
            options,
        })
    }

    /// Candidate models in preference order
    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Run a system + user prompt against the candidates in order.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Completion> {
        let messages = [Message::system(system_prompt), Message::user(user_prompt)];
        let mut last_error = None;

        for model in &self.models {
            let options = self.options.with_model(model.as_str());

            match self.provider.complete(&messages, &options).await {
                Ok(completion) => {
                    tracing::debug!(model = %model, "Completion succeeded");
                    return Ok(completion);
                }
                Err(err) if err.is_model_unavailable() => {
                    tracing::warn!(model = %model, error = %err, "Model unavailable, trying next candidate");
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::warn!(model = %model, error = %err, "Model call failed");
                    return Err(err);
                }
            }
        }

        // `models` is non-empty, so the loop ran at least once
        Err(last_error.unwrap_or_else(|| CoreError::Config("no candidate models configured".into())))
    }
}
