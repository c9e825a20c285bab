//! Payment Intent Creation
//!
//! Validates a purchase request, records a pending transaction and opens a
//! hosted payment session with the gateway.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::account::Tier;
use crate::error::{PaymentError, Result, ValidationError};
use crate::gateway::{InvoiceRequest, PaymentGateway, SESSION_LIFETIME_SECS};
use crate::store::{AccountStore, TransactionStore};
use crate::transaction::{PaymentTransaction, TransactionStatus};

/// Currencies accepted for invoices
pub const SUPPORTED_CURRENCIES: [&str; 5] = ["USD", "EUR", "USDT", "BTC", "ETH"];

pub const DEFAULT_CURRENCY: &str = "USD";

/// Window in which an open pending payment blocks a new attempt
pub const PENDING_WINDOW_MINUTES: i64 = 30;

/// Client purchase request
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Hosted payment session handed back to the client
#[derive(Clone, Debug, Serialize)]
pub struct PaymentIntent {
    pub transaction_id: Uuid,
    pub payment_url: String,
    pub gateway_ref: String,
    pub expires_at: DateTime<Utc>,
}

/// Validated purchase parameters
#[derive(Clone, Debug, PartialEq, Eq)]
struct Purchase {
    tier: Tier,
    amount: Decimal,
    currency: String,
}

impl CreatePaymentRequest {
    fn validate(&self) -> std::result::Result<Purchase, ValidationError> {
        let tier = match self.tier.as_deref() {
            Some("premium") => Tier::Premium,
            _ => return Err(ValidationError::InvalidTier),
        };

        let amount = self
            .amount
            .filter(|a| *a > Decimal::ZERO && *a <= Decimal::ONE_THOUSAND)
            .ok_or(ValidationError::InvalidAmount)?;

        let currency = self
            .currency
            .as_deref()
            .map_or_else(|| DEFAULT_CURRENCY.to_string(), |c| c.trim().to_uppercase());
        if !SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
            return Err(ValidationError::UnsupportedCurrency(currency));
        }

        Ok(Purchase {
            tier,
            amount,
            currency,
        })
    }
}

/// Opens premium purchases
pub struct PaymentIntentCreator {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    site_url: String,
}

impl PaymentIntentCreator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            gateway,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Validate, record a pending transaction, then create the gateway invoice
    pub async fn create(
        &self,
        user_id: &str,
        request: &CreatePaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntent> {
        let purchase = request.validate()?;

        if let Some(account) = self.accounts.get_account(user_id).await? {
            if account.has_active_premium(now) {
                return Err(PaymentError::AlreadySubscribed {
                    expires_at: account.subscription_expires_at,
                });
            }
        }

        let window_start = now - Duration::minutes(PENDING_WINDOW_MINUTES);
        if let Some(open) = self
            .transactions
            .latest_pending_since(user_id, window_start)
            .await?
        {
            return Err(PaymentError::PendingPaymentExists {
                transaction_id: open.id,
            });
        }

        let transaction = PaymentTransaction::new_pending(
            user_id,
            purchase.amount,
            purchase.currency.clone(),
            purchase.tier,
            now,
        );
        self.transactions.insert_transaction(&transaction).await?;

        let invoice_request = InvoiceRequest {
            amount: purchase.amount,
            currency: purchase.currency,
            order_id: format!(
                "premium_{user_id}_{}_{}",
                transaction.id,
                now.timestamp_millis()
            ),
            url_return: format!(
                "{}/payment/success?transaction_id={}",
                self.site_url, transaction.id
            ),
            url_callback: format!("{}/api/payments/webhook", self.site_url),
            is_payment_multiple: false,
            lifetime: SESSION_LIFETIME_SECS,
        };

        let invoice = match self.gateway.create_invoice(&invoice_request).await {
            Ok(invoice) => invoice,
            Err(err) => {
                tracing::error!(
                    transaction_id = %transaction.id,
                    user_id,
                    error = %err,
                    "Gateway invoice creation failed"
                );
                self.transactions
                    .transition_status(
                        transaction.id,
                        TransactionStatus::Failed,
                        json!({ "error": err.to_string(), "failed_at": now }),
                        now,
                    )
                    .await?;
                return Err(err);
            }
        };

        self.transactions
            .attach_gateway_ref(
                transaction.id,
                &invoice.uuid,
                json!({
                    "order_id": invoice.order_id,
                    "payment_url": invoice.url,
                    "gateway_status": invoice.status,
                }),
                now,
            )
            .await?;

        tracing::info!(
            transaction_id = %transaction.id,
            user_id,
            amount = %transaction.amount,
            currency = %transaction.currency,
            "Payment intent created"
        );

        Ok(PaymentIntent {
            transaction_id: transaction.id,
            payment_url: invoice.url,
            gateway_ref: invoice.uuid,
            expires_at: transaction.expires_at,
        })
    }
}
