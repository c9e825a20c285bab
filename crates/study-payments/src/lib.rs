//! # study-payments
//!
//! Crypto payments, webhook reconciliation and tier entitlements for studycards.
//!
//! ## Payment Flow
//!
//! **Flow:** Your site → Redirect to the Cryptomus hosted page → Webhook + redirect back
//!
//! ```text
//! ┌─────────────┐  create   ┌─────────────────┐  pay   ┌─────────────┐
//! │  Your Site  │─────────▶ │    Cryptomus    │◀────── │    User     │
//! │  (pricing)  │           │  Hosted Invoice │        │   wallet    │
//! └─────────────┘           └─────────────────┘        └─────────────┘
//!        ▲                          │
//!        │   signed webhook         │
//!        └──────────────────────────┘
//! ```
//!
//! 1. [`PaymentIntentCreator`] validates the request, records a `pending`
//!    transaction, then opens an invoice with the gateway.
//! 2. [`WebhookReconciler`] verifies each notification's signature, records
//!    the new status and grants premium exactly once on `paid`.
//! 3. [`UpgradeConfirmer`] lets the return page confirm early, but only after
//!    the gateway itself reports the payment as paid.
//! 4. [`EntitlementGate`] enforces monthly quotas and expires lapsed
//!    subscriptions on read.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use study_payments::{CryptomusClient, MemoryStore, PaymentIntentCreator, CreatePaymentRequest};
//!
//! let store = Arc::new(MemoryStore::new());
//! let gateway = Arc::new(CryptomusClient::from_env()?);
//! let creator = PaymentIntentCreator::new(store.clone(), store, gateway, "https://cards.example");
//!
//! let intent = creator.create(&user_id, &request, chrono::Utc::now()).await?;
//! // Redirect user to: intent.payment_url
//! ```

mod account;
mod confirm;
mod entitlement;
mod error;
mod gateway;
mod intent;
mod signature;
mod store;
mod transaction;
mod webhook;

pub use account::{Account, Tier, TierLimits};
pub use confirm::{Confirmation, UpgradeConfirmer};
pub use entitlement::{EntitlementGate, GrantOutcome, Usage, grant_premium};
pub use error::{PaymentError, Result, ValidationError};
pub use gateway::{
    CryptomusClient, CryptomusConfig, GatewayStatus, Invoice, InvoiceRequest, PaymentGateway,
    SESSION_LIFETIME_SECS,
};
pub use intent::{
    CreatePaymentRequest, DEFAULT_CURRENCY, PENDING_WINDOW_MINUTES, PaymentIntent,
    PaymentIntentCreator, SUPPORTED_CURRENCIES,
};
pub use signature::{SIGN_FIELD, SignatureVerifier, sign, verify};
pub use store::{AccountStore, AccountUpdate, MemoryStore, TransactionStore};
pub use transaction::{
    ENTITLEMENT_PERIOD_DAYS, PaymentTransaction, StatusTransition, TransactionStatus,
    merge_metadata,
};
pub use webhook::{ReconcileReport, UpgradeResult, WebhookAck, WebhookReconciler};
