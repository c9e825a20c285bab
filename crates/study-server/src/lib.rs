//! studycards HTTP Server
//!
//! Axum-based REST API over the flashcard, payment and entitlement services.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod responses;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    confirm_upgrade, create_payment, delete_set, generate_flashcards, get_set, get_usage,
    health_check, list_models, list_sets, method_not_allowed, payment_webhook, review_flashcard,
    update_set,
};
pub use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Payments
        .route("/api/payments/create", post(create_payment))
        .route(
            "/api/payments/webhook",
            post(payment_webhook).fallback(method_not_allowed),
        )
        .route("/api/user/upgrade", post(confirm_upgrade))
        .route("/api/user/usage", get(get_usage))
        // Flashcards
        .route("/api/flashcards/generate", post(generate_flashcards))
        .route("/api/flashcards/sets", get(list_sets))
        .route(
            "/api/flashcards/sets/{id}",
            get(get_set).put(update_set).delete(delete_set),
        )
        .route("/api/flashcards/{id}/review", post(review_flashcard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
