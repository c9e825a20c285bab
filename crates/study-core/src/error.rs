//! Error Types

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// LLM provider error classes
#[derive(Error, Debug)]
pub enum CoreError {
    /// Provider returned an error we could not classify further
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unreachable (network, timeout)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider answered with a non-success status
    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The requested model has been retired or decommissioned
    #[error("Model {model} unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    /// Provider-side rate limiting
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// API key rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider responded but without usable content
    #[error("Empty completion from model {0}")]
    EmptyCompletion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the next candidate model should be tried after this error.
    pub fn is_model_unavailable(&self) -> bool {
        match self {
            Self::ModelUnavailable { .. } => true,
            Self::Api { status, message } => crate::fallback::is_model_retired(*status, message),
            _ => false,
        }
    }

    /// Check if error is retryable by the caller at a later time
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::RateLimited(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited(_) => {
                "The AI provider is rate limiting requests. Please wait a moment and try again."
                    .into()
            }
            Self::Auth(_) | Self::Config(_) => "The AI service is misconfigured.".into(),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ModelUnavailable { .. } => "No AI model is currently available.".into(),
            Self::Api { message, .. } | Self::Provider(message) => {
                format!("The AI service encountered an error: {message}")
            }
            Self::EmptyCompletion(_) | Self::Json(_) => {
                "The AI service returned an empty response.".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decommissioned_api_error_counts_as_unavailable() {
        let err = CoreError::Api {
            status: 400,
            message: "The model `llama3-70b-8192` has been decommissioned".into(),
        };
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn auth_error_is_not_unavailable() {
        assert!(!CoreError::Auth("invalid api key".into()).is_model_unavailable());
        assert!(!CoreError::Auth("invalid api key".into()).is_retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        assert!(CoreError::RateLimited("slow down".into()).is_retryable());
    }
}
