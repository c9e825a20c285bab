//! Webhook Reconciliation
//!
//! Gateway notifications are the source of truth for payment progress. Each
//! verified notification is recorded on its transaction, and a paid one
//! upgrades the account exactly once no matter how often it is redelivered.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::account::TierLimits;
use crate::entitlement::{GrantOutcome, grant_premium};
use crate::error::{PaymentError, Result, ValidationError};
use crate::gateway::GatewayStatus;
use crate::signature::{SIGN_FIELD, SignatureVerifier};
use crate::store::{AccountStore, TransactionStore};
use crate::transaction::TransactionStatus;

/// Acknowledgement body the gateway expects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub state: u8,
}

impl WebhookAck {
    pub const OK: Self = Self { state: 0 };
}

/// What happened to the account for this notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeResult {
    /// Status did not map to completed
    NotApplicable,
    Applied(GrantOutcome),
    /// Logged for operator reconciliation; the notification is still acknowledged
    Failed,
}

/// Outcome of one processed notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    pub transaction_id: Uuid,
    pub gateway_status: GatewayStatus,
    pub previous: TransactionStatus,
    pub status: TransactionStatus,
    pub upgrade: UpgradeResult,
}

impl ReconcileReport {
    pub const fn ack(&self) -> WebhookAck {
        WebhookAck::OK
    }
}

/// Applies gateway notifications to transactions and accounts
pub struct WebhookReconciler {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    verifier: SignatureVerifier,
    limits: TierLimits,
}

impl WebhookReconciler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        verifier: SignatureVerifier,
        limits: TierLimits,
    ) -> Self {
        Self {
            accounts,
            transactions,
            verifier,
            limits,
        }
    }

    /// Process a raw notification body
    pub async fn handle(&self, body: &[u8], now: DateTime<Utc>) -> Result<ReconcileReport> {
        let Ok(mut payload) = serde_json::from_slice::<Value>(body) else {
            tracing::warn!("Rejected webhook with unparseable body");
            return Err(PaymentError::InvalidSignature);
        };

        if !self.verifier.verify_webhook(&payload) {
            tracing::warn!("Rejected webhook with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }

        let field = |name: &str| {
            payload
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ValidationError::MalformedWebhook(format!("missing `{name}`")))
        };
        let gateway_ref = field("uuid")?;
        let gateway_status = GatewayStatus::parse(&field("status")?);

        let transaction = self
            .transactions
            .find_by_gateway_ref(&gateway_ref)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(gateway_ref.clone()))?;

        if let GatewayStatus::Unknown(raw) = &gateway_status {
            tracing::warn!(
                transaction_id = %transaction.id,
                status = %raw,
                "Unrecognized gateway status, keeping transaction pending"
            );
        }

        if let Some(fields) = payload.as_object_mut() {
            fields.shift_remove(SIGN_FIELD);
        }
        let target = gateway_status.local_status();
        let transition = self
            .transactions
            .transition_status(
                transaction.id,
                target,
                json!({ "webhook_payload": payload, "last_webhook_at": now }),
                now,
            )
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(gateway_ref.clone()))?;

        tracing::info!(
            transaction_id = %transaction.id,
            gateway_status = %gateway_status,
            previous = %transition.previous,
            status = %transition.current,
            "Webhook processed"
        );

        let upgrade = if target == TransactionStatus::Completed {
            match grant_premium(
                self.accounts.as_ref(),
                &transaction.user_id,
                transaction.expires_at,
                self.limits,
                now,
            )
            .await
            {
                Ok(outcome) => UpgradeResult::Applied(outcome),
                Err(err) => {
                    tracing::error!(
                        transaction_id = %transaction.id,
                        user_id = %transaction.user_id,
                        error = %err,
                        "Premium upgrade failed after payment completed"
                    );
                    UpgradeResult::Failed
                }
            }
        } else {
            UpgradeResult::NotApplicable
        };

        Ok(ReconcileReport {
            transaction_id: transaction.id,
            gateway_status,
            previous: transition.previous,
            status: transition.current,
            upgrade,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::account::{Account, Tier};
    use crate::entitlement::EntitlementGate;
    use crate::signature::sign;
    use crate::store::{AccountUpdate, MemoryStore};
    use crate::transaction::PaymentTransaction;

    const KEY: &str = "webhook-secret";

    fn body(gateway_ref: &str, status: &str) -> Vec<u8> {
        let mut payload = json!({
            "type": "payment",
            "uuid": gateway_ref,
            "order_id": "premium_u1_x_1",
            "amount": "9.99",
            "payment_amount": "9.99",
            "is_final": true,
            "status": status,
            "currency": "USD",
            "network": "tron",
        });
        let signature = sign(&payload, KEY).unwrap();
        payload[SIGN_FIELD] = Value::String(signature);
        serde_json::to_vec(&payload).unwrap()
    }

    async fn seeded(store: &MemoryStore, now: DateTime<Utc>) -> PaymentTransaction {
        let tx = PaymentTransaction::new_pending("u1", dec!(9.99), "USD", Tier::Premium, now);
        store.insert_transaction(&tx).await.unwrap();
        store
            .attach_gateway_ref(tx.id, "gw-1", Value::Null, now)
            .await
            .unwrap()
            .unwrap()
    }

    fn reconciler(accounts: Arc<dyn AccountStore>, store: Arc<MemoryStore>) -> WebhookReconciler {
        WebhookReconciler::new(
            accounts,
            store,
            SignatureVerifier::new(KEY),
            TierLimits::default(),
        )
    }

    #[tokio::test]
    async fn paid_twice_upgrades_once() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let tx = seeded(&store, now).await;
        let reconciler = reconciler(store.clone(), store.clone());

        let first = reconciler.handle(&body("gw-1", "paid"), now).await.unwrap();
        assert_eq!(first.status, TransactionStatus::Completed);
        assert_eq!(first.upgrade, UpgradeResult::Applied(GrantOutcome::Upgraded));
        let after_first = store.get_account("u1").await.unwrap().unwrap();
        assert_eq!(after_first.tier, Tier::Premium);
        assert_eq!(after_first.monthly_limit, 1000);
        assert_eq!(after_first.subscription_expires_at, Some(tx.expires_at));

        let later = now + Duration::minutes(3);
        let second = reconciler.handle(&body("gw-1", "paid"), later).await.unwrap();
        assert_eq!(second.ack(), WebhookAck::OK);
        assert_eq!(second.upgrade, UpgradeResult::Applied(GrantOutcome::AlreadyGranted));
        assert_eq!(store.get_account("u1").await.unwrap().unwrap(), after_first);

        let stored = store.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.gateway_data["last_webhook_at"], json!(later));
        assert!(stored.gateway_data["webhook_payload"].get(SIGN_FIELD).is_none());
    }

    #[tokio::test]
    async fn replay_after_expiry_leaves_account_alone() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let tx = seeded(&store, now).await;
        let reconciler = reconciler(store.clone(), store.clone());
        let gate = EntitlementGate::new(store.clone(), TierLimits::default());

        reconciler.handle(&body("gw-1", "paid"), now).await.unwrap();

        let lapsed = tx.expires_at + Duration::days(1);
        let usage = gate.usage("u1", None, lapsed).await.unwrap();
        assert_eq!(usage.tier, Tier::Free);
        let before = store.get_account("u1").await.unwrap().unwrap();

        let replay = reconciler.handle(&body("gw-1", "paid"), lapsed).await.unwrap();
        assert_eq!(replay.ack(), WebhookAck::OK);
        assert_eq!(replay.upgrade, UpgradeResult::Applied(GrantOutcome::AlreadyGranted));

        let after = store.get_account("u1").await.unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(after.monthly_limit, 10);
        assert_eq!(after.subscription_expires_at, None);
    }

    #[tokio::test]
    async fn late_failure_does_not_revert_completed() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let tx = seeded(&store, now).await;
        let reconciler = reconciler(store.clone(), store.clone());

        reconciler.handle(&body("gw-1", "paid_over"), now).await.unwrap();
        let report = reconciler.handle(&body("gw-1", "cancel"), now).await.unwrap();

        assert_eq!(report.status, TransactionStatus::Completed);
        assert_eq!(report.upgrade, UpgradeResult::NotApplicable);
        let stored = store.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.gateway_data["webhook_payload"]["status"], "cancel");
    }

    #[tokio::test]
    async fn status_mapping() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        seeded(&store, now).await;
        let reconciler = reconciler(store.clone(), store.clone());

        let report = reconciler.handle(&body("gw-1", "confirm_check"), now).await.unwrap();
        assert_eq!(report.status, TransactionStatus::Pending);

        let report = reconciler.handle(&body("gw-1", "wrong_amount"), now).await.unwrap();
        assert_eq!(report.status, TransactionStatus::Pending);
        assert_eq!(report.gateway_status, GatewayStatus::Unknown("wrong_amount".into()));

        let report = reconciler.handle(&body("gw-1", "system_fail"), now).await.unwrap();
        assert_eq!(report.status, TransactionStatus::Failed);
        assert!(store.get_account("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_signature_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let tx = seeded(&store, now).await;
        let reconciler = reconciler(store.clone(), store.clone());

        let mut tampered: Value = serde_json::from_slice(&body("gw-1", "paid")).unwrap();
        tampered["amount"] = json!("0.01");
        let err = reconciler
            .handle(&serde_json::to_vec(&tampered).unwrap(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature));

        let err = reconciler.handle(b"not json", now).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature));

        let stored = store.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(stored, tx);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_created() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(store.clone(), store.clone());

        let err = reconciler
            .handle(&body("gw-missing", "paid"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::TransactionNotFound(_)));
        assert!(store.find_by_gateway_ref("gw-missing").await.unwrap().is_none());
    }

    struct BrokenAccounts;

    #[async_trait]
    impl AccountStore for BrokenAccounts {
        async fn get_account(&self, _user_id: &str) -> Result<Option<Account>> {
            Err(PaymentError::Storage("connection reset".into()))
        }

        async fn insert_account(&self, _account: Account) -> Result<Account> {
            Err(PaymentError::Storage("connection reset".into()))
        }

        async fn update_account(
            &self,
            _user_id: &str,
            _update: AccountUpdate<'_>,
        ) -> Result<Option<(Account, bool)>> {
            Err(PaymentError::Storage("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn upgrade_failure_still_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let tx = seeded(&store, now).await;
        let reconciler = reconciler(Arc::new(BrokenAccounts), store.clone());

        let report = reconciler.handle(&body("gw-1", "paid"), now).await.unwrap();
        assert_eq!(report.upgrade, UpgradeResult::Failed);
        assert_eq!(report.ack(), WebhookAck::OK);

        let stored = store.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }
}
