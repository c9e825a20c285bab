//! HTTP Handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use flashcards::{
    Flashcard, FlashcardSet, GenerateRequest, GeneratedSet, ListParams, Page, SetSummary,
    SetUpdate, SetWithCards,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use study_payments::{
    Confirmation, CreatePaymentRequest, PaymentError, PaymentIntent, Usage, WebhookAck,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::responses::{ApiResult, json_body, ok};
use crate::state::{AppState, Payments};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub llm_configured: bool,
    pub llm_reachable: bool,
    pub payments_configured: bool,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub generation_enabled: bool,
}

#[derive(Serialize)]
pub struct UpgradeResponse {
    #[serde(flatten)]
    pub confirmation: Confirmation,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Deserialize)]
struct UpgradeRequest {
    #[serde(default)]
    transaction_id: Option<String>,
}

#[derive(Deserialize)]
struct ReviewRequest {
    #[serde(default)]
    correct: Value,
}

fn payments(state: &AppState) -> Result<&Payments, ApiError> {
    state.payments.as_deref().ok_or_else(ApiError::payments_disabled)
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Unparseable ids can never match a stored row
fn resource_id(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::from(flashcards::DeckError::NotFound(what)))
}

// ============================================================================
// Health & info
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let llm_reachable = match &state.provider {
        Some(provider) => provider.health_check().await.unwrap_or(false),
        None => false,
    };

    ok(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        llm_configured: state.provider.is_some(),
        llm_reachable,
        payments_configured: state.payments.is_some(),
    })
}

/// Candidate models in fallback order
pub async fn list_models(State(state): State<AppState>) -> ApiResult<ModelsResponse> {
    ok(ModelsResponse {
        models: state.models.to_vec(),
        generation_enabled: state.generator.is_some(),
    })
}

// ============================================================================
// Payments
// ============================================================================

/// Open a hosted payment session
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<PaymentIntent> {
    let payments = payments(&state)?;
    let request: CreatePaymentRequest = json_body(&body)?;

    let intent = payments.creator.create(&user.id, &request, now()).await?;
    ok(intent)
}

/// Gateway notification endpoint
pub async fn payment_webhook(State(state): State<AppState>, body: Bytes) -> Result<Json<WebhookAck>, ApiError> {
    let Some(payments) = state.payments.as_deref() else {
        tracing::error!("Webhook received but the payment gateway is not configured");
        return Err(ApiError::gateway_misconfigured());
    };
    let report = payments.reconciler.handle(&body, now()).await?;
    Ok(Json(report.ack()))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// Confirm a purchase from the return page
pub async fn confirm_upgrade(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<UpgradeResponse> {
    let payments = payments(&state)?;
    let request: UpgradeRequest = json_body(&body)?;

    let raw_id = request
        .transaction_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Transaction ID is required"))?;
    let transaction_id: Uuid = raw_id
        .trim()
        .parse()
        .map_err(|_| ApiError::from(PaymentError::TransactionNotFound(raw_id.clone())))?;

    let confirmation = payments
        .confirmer
        .confirm(&user.id, transaction_id, now())
        .await?;

    let message = if confirmation.already_upgraded {
        "Account already upgraded to premium"
    } else {
        "Account successfully upgraded to premium"
    };
    ok(UpgradeResponse {
        confirmation,
        message,
    })
}

/// Usage for the caller, after expiry and monthly reset
pub async fn get_usage(State(state): State<AppState>, user: AuthUser) -> ApiResult<Usage> {
    let usage = state
        .gate
        .usage(&user.id, user.email.as_deref(), now())
        .await?;
    ok(usage)
}

// ============================================================================
// Flashcards
// ============================================================================

/// Generate a set from notes
pub async fn generate_flashcards(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<GeneratedSet> {
    let generator = state
        .generator
        .as_deref()
        .ok_or_else(ApiError::generation_disabled)?;
    let request: GenerateRequest = json_body(&body)?;

    let generated = generator
        .generate(&user.id, user.email.as_deref(), &request, now())
        .await?;
    ok(generated)
}

pub async fn list_sets(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Page<SetSummary>> {
    ok(state.decks.list(&user.id, params).await?)
}

pub async fn get_set(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<SetWithCards> {
    let id = resource_id(&id, "Flashcard set")?;
    ok(state.decks.get(&user.id, id).await?)
}

pub async fn update_set(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<FlashcardSet> {
    let id = resource_id(&id, "Flashcard set")?;
    let update: SetUpdate = json_body(&body)?;
    ok(state.decks.update(&user.id, id, update, now()).await?)
}

pub async fn delete_set(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    let id = resource_id(&id, "Flashcard set")?;
    state.decks.delete(&user.id, id).await?;
    ok(Deleted { id, deleted: true })
}

pub async fn review_flashcard(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Flashcard> {
    let id = resource_id(&id, "Flashcard")?;
    let request: ReviewRequest = json_body(&body)?;
    let Value::Bool(correct) = request.correct else {
        return Err(ApiError::bad_request("Correct must be a boolean value"));
    };

    ok(state.decks.review(&user.id, id, correct, now()).await?)
}
