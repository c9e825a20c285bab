//! Groq LLM Provider
//!
//! Implementation of `LlmProvider` for Groq's OpenAI-compatible
//! chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use study_core::{
    error::{CoreError, Result},
    fallback::is_model_retired,
    message::Message,
    provider::{Completion, GenerationOptions, LlmProvider, TokenUsage},
};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq provider configuration
#[derive(Clone)]
pub struct GroqConfig {
    /// API base URL (without trailing slash)
    pub base_url: String,

    /// Bearer API key
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            timeout_secs: 60,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GROQ_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CoreError::Config("GROQ_API_KEY not set".into()))?;

        let mut config = Self::new(api_key);
        if let Some(url) = lookup("GROQ_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("GROQ_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.timeout_secs = secs;
        }

        Ok(config)
    }
}

/// Groq LLM provider
pub struct GroqProvider {
    client: reqwest::Client,
    config: GroqConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GroqProvider {
    /// Create from configuration
    pub fn from_config(config: GroqConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GroqConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Map a non-success answer onto the typed error classes
    fn classify(status: StatusCode, body: &str, model: &str) -> CoreError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS => CoreError::RateLimited(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoreError::Auth(message),
            s if is_model_retired(s.as_u16(), &message) => CoreError::ModelUnavailable {
                model: model.to_string(),
                message,
            },
            s => CoreError::Api {
                status: s.as_u16(),
                message,
            },
        }
    }

    fn transport_error(err: &reqwest::Error) -> CoreError {
        if err.is_timeout() || err.is_connect() {
            CoreError::ProviderUnavailable(err.to_string())
        } else {
            CoreError::Provider(err.to_string())
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "Groq"
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(self.url("/models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::warn!("Groq health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        if !status.is_success() {
            return Err(Self::classify(status, &body, &options.model));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CoreError::EmptyCompletion(options.model.clone()))?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| options.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};
    use serde_json::{Value, json};

    use super::*;

    async fn chat_stub(Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        match body["model"].as_str().unwrap_or_default() {
            "retired" => (
                AxumStatus::BAD_REQUEST,
                Json(json!({"error": {
                    "message": "The model `retired` has been decommissioned and is no longer supported.",
                    "type": "invalid_request_error",
                    "code": "model_decommissioned"
                }})),
            ),
            "busy" => (
                AxumStatus::TOO_MANY_REQUESTS,
                Json(json!({"error": {"message": "Rate limit reached"}})),
            ),
            "locked" => (
                AxumStatus::UNAUTHORIZED,
                Json(json!({"error": {"message": "Invalid API Key"}})),
            ),
            "broken" => (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({"error": {"message": "upstream exploded"}})),
            ),
            model => (
                AxumStatus::OK,
                Json(json!({
                    "model": model,
                    "choices": [{"message": {"role": "assistant", "content": "[]"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
                })),
            ),
        }
    }

    async fn spawn_stub() -> String {
        let app = Router::new().route("/chat/completions", post(chat_stub));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn provider() -> GroqProvider {
        let mut config = GroqConfig::new("test-key");
        config.base_url = spawn_stub().await;
        GroqProvider::from_config(config).unwrap()
    }

    async fn call(provider: &GroqProvider, model: &str) -> Result<Completion> {
        let messages = [Message::system("sys"), Message::user("notes")];
        let options = GenerationOptions::default().with_model(model);
        provider.complete(&messages, &options).await
    }

    #[tokio::test]
    async fn parses_successful_completion() {
        let provider = provider().await;
        let completion = call(&provider, "llama-3.1-8b-instant").await.unwrap();

        assert_eq!(completion.content, "[]");
        assert_eq!(completion.model, "llama-3.1-8b-instant");
        assert_eq!(completion.usage.unwrap().total_tokens, 12);
    }

    #[tokio::test]
    async fn classifies_provider_errors() {
        let provider = provider().await;

        let retired = call(&provider, "retired").await.unwrap_err();
        assert!(matches!(retired, CoreError::ModelUnavailable { ref model, .. } if model == "retired"));
        assert!(retired.is_model_unavailable());

        assert!(matches!(call(&provider, "busy").await, Err(CoreError::RateLimited(_))));
        assert!(matches!(call(&provider, "locked").await, Err(CoreError::Auth(_))));
        assert!(matches!(
            call(&provider, "broken").await,
            Err(CoreError::Api { status: 500, .. })
        ));
    }

    #[test]
    fn config_requires_api_key() {
        let missing = GroqConfig::from_lookup(|_| None);
        assert!(matches!(missing, Err(CoreError::Config(_))));

        let config = GroqConfig::from_lookup(|key| match key {
            "GROQ_API_KEY" => Some("gsk_test".into()),
            "GROQ_API_URL" => Some("http://localhost:9999/".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.timeout_secs, 60);
        assert!(!format!("{config:?}").contains("gsk_test"));
    }
}
