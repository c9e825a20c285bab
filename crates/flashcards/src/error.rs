//! Error Types for Flashcards

use study_core::CoreError;
use study_payments::PaymentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeckError>;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model output was not a usable card list
    #[error("Invalid AI output: {0}")]
    InvalidAiOutput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Llm(#[from] CoreError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DeckError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidAiOutput(_) => "INVALID_AI_OUTPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Llm(CoreError::RateLimited(_)) => "PROVIDER_RATE_LIMITED",
            Self::Llm(CoreError::Auth(_) | CoreError::Config(_)) => "PROVIDER_MISCONFIGURED",
            Self::Llm(CoreError::ProviderUnavailable(_)) => "PROVIDER_UNAVAILABLE",
            Self::Llm(_) => "PROVIDER_ERROR",
            Self::Payment(err) => err.code(),
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(reason) => reason.clone(),
            Self::InvalidAiOutput(_) => {
                "The AI returned an unexpected response. Please try again.".into()
            }
            Self::NotFound(what) => format!("{what} not found"),
            Self::Llm(err) => err.user_message(),
            Self::Payment(err) => err.user_message(),
            Self::Storage(_) => "An error occurred processing your request.".into(),
        }
    }
}
