//! API Errors
//!
//! Every failure leaves the server as `{ success: false, error, code }`
//! with a status derived from the domain error.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flashcards::DeckError;
use serde::Serialize;
use study_core::CoreError;
use study_payments::{PaymentError, Usage, ValidationError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub usage: Option<Usage>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<&'a Usage>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            usage: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Unauthorized")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method not allowed")
    }

    pub fn payments_disabled() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments are not configured",
        )
    }

    /// Gateway notifications arriving while no merchant key is configured
    pub fn gateway_misconfigured() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "GATEWAY_NOT_CONFIGURED",
            "Payment gateway is not configured",
        )
    }

    pub fn generation_disabled() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "GENERATION_DISABLED",
            "Flashcard generation is not configured",
        )
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let status = match &err {
            PaymentError::Validation(
                ValidationError::InvalidTier
                | ValidationError::InvalidAmount
                | ValidationError::UnsupportedCurrency(_)
                | ValidationError::MalformedWebhook(_),
            )
            | PaymentError::AlreadySubscribed { .. }
            | PaymentError::PendingPaymentExists { .. }
            | PaymentError::PaymentNotConfirmed(_) => StatusCode::BAD_REQUEST,
            PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
            PaymentError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            PaymentError::Gateway(_) | PaymentError::Config(_) | PaymentError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut api = Self::new(status, err.code(), err.user_message());
        if let PaymentError::QuotaExceeded(usage) = err {
            api.usage = Some(usage);
        } else if status.is_server_error() {
            tracing::error!(error = %err, code = api.code, "Payment request failed");
        }
        api
    }
}

impl From<DeckError> for ApiError {
    fn from(err: DeckError) -> Self {
        let err = match err {
            DeckError::Payment(inner) => return inner.into(),
            other => other,
        };

        let status = match &err {
            DeckError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DeckError::NotFound(_) => StatusCode::NOT_FOUND,
            DeckError::Llm(CoreError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            DeckError::InvalidAiOutput(_)
            | DeckError::Llm(_)
            | DeckError::Storage(_)
            | DeckError::Payment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, code = err.code(), "Flashcard request failed");
        }
        Self::new(status, err.code(), err.user_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: &self.message,
            code: self.code,
            usage: self.usage.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}
