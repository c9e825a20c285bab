//! studycards server binary

use std::sync::Arc;

use study_core::LlmProvider;
use study_payments::{CryptomusClient, PaymentGateway};
use study_runtime::GroqProvider;
use study_server::{AppState, config::ServerConfig, router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider: Option<Arc<dyn LlmProvider>> = match config.groq.clone() {
        Some(groq) => {
            let provider = Arc::new(GroqProvider::from_config(groq)?);
            match provider.health_check().await {
                Ok(true) => tracing::info!("✓ Connected to Groq"),
                Ok(false) | Err(_) => tracing::warn!("⚠ Groq not reachable - generation may fail"),
            }
            for (rank, model) in config.models.iter().enumerate() {
                tracing::info!("  Model {}: {}", rank + 1, model);
            }
            Some(provider as Arc<dyn LlmProvider>)
        }
        None => {
            tracing::warn!("⚠ Groq not configured - generation disabled");
            tracing::warn!("  Set GROQ_API_KEY in .env");
            None
        }
    };

    // Initialize payments
    let gateway = match config.cryptomus.clone() {
        Some(cryptomus) => {
            let client = CryptomusClient::new(cryptomus)?;
            let verifier = client.verifier();
            tracing::info!("✓ Cryptomus configured");
            Some((Arc::new(client) as Arc<dyn PaymentGateway>, verifier))
        }
        None => {
            tracing::warn!("⚠ Cryptomus not configured - payments disabled");
            tracing::warn!("  Set CRYPTOMUS_API_KEY and CRYPTOMUS_MERCHANT_ID in .env");
            None
        }
    };

    // Build application state
    let state = AppState::new(&config, provider, gateway)?;
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 studycards server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  GET  /api/models                  - Fallback model order");
    tracing::info!("  POST /api/payments/create         - Open payment session");
    tracing::info!("  POST /api/payments/webhook        - Gateway notifications");
    tracing::info!("  POST /api/user/upgrade            - Confirm purchase");
    tracing::info!("  GET  /api/user/usage              - Monthly usage");
    tracing::info!("  POST /api/flashcards/generate     - Generate a set");
    tracing::info!("  GET  /api/flashcards/sets         - List sets");
    tracing::info!("  *    /api/flashcards/sets/{{id}}    - Get/update/delete a set");
    tracing::info!("  POST /api/flashcards/{{id}}/review - Record a review");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
