//! Direct Upgrade Confirmation
//!
//! The return page lets a user confirm their purchase without waiting for the
//! webhook. The client's word is never enough: a pending transaction only
//! completes when the gateway itself reports it paid.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::account::TierLimits;
use crate::entitlement::{GrantOutcome, grant_premium};
use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::store::{AccountStore, TransactionStore};
use crate::transaction::TransactionStatus;

/// Result of a confirmation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub transaction_id: Uuid,
    pub already_upgraded: bool,
    pub subscription_expires_at: DateTime<Utc>,
}

pub struct UpgradeConfirmer {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    limits: TierLimits,
}

impl UpgradeConfirmer {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        limits: TierLimits,
    ) -> Self {
        Self {
            accounts,
            transactions,
            gateway,
            limits,
        }
    }

    /// Confirm a purchase owned by `user_id`
    pub async fn confirm(
        &self,
        user_id: &str,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Confirmation> {
        let transaction = self
            .transactions
            .get_owned_transaction(transaction_id, user_id)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(transaction_id.to_string()))?;

        match transaction.status {
            TransactionStatus::Completed => {}
            TransactionStatus::Failed => {
                return Err(PaymentError::PaymentNotConfirmed("payment failed".into()));
            }
            TransactionStatus::Refunded => {
                return Err(PaymentError::PaymentNotConfirmed("payment was refunded".into()));
            }
            TransactionStatus::Pending => {
                let gateway_ref = transaction.gateway_ref.as_deref().ok_or_else(|| {
                    PaymentError::PaymentNotConfirmed("no payment session was opened".into())
                })?;

                let gateway_status = self.gateway.payment_status(gateway_ref).await?;
                if !gateway_status.is_paid() {
                    tracing::info!(
                        transaction_id = %transaction.id,
                        gateway_status = %gateway_status,
                        "Direct confirmation refused, gateway reports unpaid"
                    );
                    return Err(PaymentError::PaymentNotConfirmed(format!(
                        "gateway reports `{gateway_status}`"
                    )));
                }

                self.transactions
                    .transition_status(
                        transaction.id,
                        TransactionStatus::Completed,
                        json!({
                            "confirmed_via": "direct",
                            "confirmed_gateway_status": gateway_status.as_str(),
                            "confirmed_at": now,
                        }),
                        now,
                    )
                    .await?
                    .ok_or_else(|| PaymentError::TransactionNotFound(transaction_id.to_string()))?;
            }
        }

        let outcome = grant_premium(
            self.accounts.as_ref(),
            user_id,
            transaction.expires_at,
            self.limits,
            now,
        )
        .await?;

        tracing::info!(
            transaction_id = %transaction.id,
            user_id,
            outcome = ?outcome,
            "Direct confirmation processed"
        );

        Ok(Confirmation {
            transaction_id: transaction.id,
            already_upgraded: outcome == GrantOutcome::AlreadyGranted,
            subscription_expires_at: transaction.expires_at,
        })
    }
}
