//! Application State

use std::sync::Arc;

use flashcards::{DeckService, FlashcardGenerator, FlashcardStore, MemoryFlashcardStore};
use study_core::{LlmProvider, ModelFallbackClient};
use study_payments::{
    AccountStore, EntitlementGate, MemoryStore, PaymentGateway, PaymentIntentCreator,
    SignatureVerifier, TransactionStore, UpgradeConfirmer, WebhookReconciler,
};

use crate::auth::AuthKeys;
use crate::config::ServerConfig;

/// Payment services (present only when the gateway is configured)
pub struct Payments {
    pub creator: PaymentIntentCreator,
    pub reconciler: WebhookReconciler,
    pub confirmer: UpgradeConfirmer,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthKeys,

    /// Quota and subscription checks
    pub gate: EntitlementGate,

    pub decks: DeckService,

    /// Candidate models, in fallback order
    pub models: Arc<[String]>,

    /// LLM provider (None if not configured)
    pub provider: Option<Arc<dyn LlmProvider>>,

    pub generator: Option<Arc<FlashcardGenerator>>,

    /// Gateway-backed payment services (None if not configured)
    pub payments: Option<Arc<Payments>>,
}

impl AppState {
    /// Wire services over in-memory stores
    pub fn new(
        config: &ServerConfig,
        provider: Option<Arc<dyn LlmProvider>>,
        gateway: Option<(Arc<dyn PaymentGateway>, SignatureVerifier)>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let accounts: Arc<dyn AccountStore> = store.clone();
        let transactions: Arc<dyn TransactionStore> = store;
        let cards: Arc<dyn FlashcardStore> = Arc::new(MemoryFlashcardStore::new());

        let gate = EntitlementGate::new(accounts.clone(), config.limits);

        let generator = match &provider {
            Some(provider) => {
                let llm = ModelFallbackClient::new(provider.clone(), config.models.clone())?;
                Some(Arc::new(FlashcardGenerator::new(llm, gate.clone(), cards.clone())))
            }
            None => None,
        };

        let payments = gateway.map(|(gateway, verifier)| {
            Arc::new(Payments {
                creator: PaymentIntentCreator::new(
                    accounts.clone(),
                    transactions.clone(),
                    gateway.clone(),
                    config.site_url.clone(),
                ),
                reconciler: WebhookReconciler::new(
                    accounts.clone(),
                    transactions.clone(),
                    verifier,
                    config.limits,
                ),
                confirmer: UpgradeConfirmer::new(
                    accounts.clone(),
                    transactions.clone(),
                    gateway,
                    config.limits,
                ),
            })
        });

        Ok(Self {
            auth: AuthKeys::from_secret(&config.jwt_secret),
            gate,
            decks: DeckService::new(cards),
            models: config.models.clone().into(),
            provider,
            generator,
            payments,
        })
    }
}
