//! Payment Error Types

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::entitlement::Usage;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Client-caused request problems
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid tier specified")]
    InvalidTier,

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Request failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// User already holds an unexpired premium subscription
    #[error("Premium subscription already active")]
    AlreadySubscribed { expires_at: Option<DateTime<Utc>> },

    /// A recent payment attempt is still open
    #[error("Payment {transaction_id} is still pending")]
    PendingPaymentExists { transaction_id: Uuid },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid")]
    InvalidSignature,

    /// Transaction not found (or not owned by the caller)
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Direct confirmation requested for an unpaid transaction
    #[error("Payment not confirmed: {0}")]
    PaymentNotConfirmed(String),

    /// Monthly generation quota used up
    #[error("Monthly generation limit reached")]
    QuotaExceeded(Usage),

    /// Gateway API error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Storage(_))
    }

    /// Whether the caller must change the request ("fix your request")
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::AlreadySubscribed { .. }
                | Self::PendingPaymentExists { .. }
                | Self::PaymentNotConfirmed(_)
        )
    }

    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::InvalidTier) => "INVALID_TIER",
            Self::Validation(ValidationError::InvalidAmount) => "INVALID_AMOUNT",
            Self::Validation(ValidationError::UnsupportedCurrency(_)) => "UNSUPPORTED_CURRENCY",
            Self::Validation(ValidationError::MalformedWebhook(_)) => "MALFORMED_WEBHOOK",
            Self::AlreadySubscribed { .. } => "ALREADY_PREMIUM",
            Self::PendingPaymentExists { .. } => "PAYMENT_PENDING",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::PaymentNotConfirmed(_) => "PAYMENT_NOT_CONFIRMED",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::Config(_) => "PAYMENTS_MISCONFIGURED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::AlreadySubscribed { .. } => "You already have an active premium subscription.".into(),
            Self::PendingPaymentExists { .. } => {
                "A payment is already in progress. Please complete it or try again in 30 minutes."
                    .into()
            }
            Self::InvalidSignature => "Invalid signature".into(),
            Self::TransactionNotFound(_) => "Transaction not found".into(),
            Self::PaymentNotConfirmed(reason) => format!("Payment has not been confirmed: {reason}"),
            Self::QuotaExceeded(_) => {
                "Monthly flashcard limit reached. Upgrade to premium for more generations!".into()
            }
            Self::Gateway(_) => "Payment processing failed. Please try again.".into(),
            Self::Config(_) => "Payment service configuration error.".into(),
            Self::Storage(_) => "An error occurred processing your request.".into(),
        }
    }
}
