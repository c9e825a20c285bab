//! Payment Transactions
//!
//! Local record of every payment attempt. Rows are never deleted; the
//! gateway metadata blob is merged on each update so the full notification
//! history stays reconstructable.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::account::Tier;

/// Entitlement period granted by a completed payment
pub const ENTITLEMENT_PERIOD_DAYS: i64 = 30;

/// Local transaction status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment attempt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,

    /// Gateway `uuid`, known once the gateway accepted the invoice
    pub gateway_ref: Option<String>,

    pub tier_purchased: Tier,

    /// End of the entitlement period granted if this payment completes
    pub expires_at: DateTime<Utc>,

    /// Opaque gateway metadata, merged on every update
    pub gateway_data: Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// A fresh pending attempt
    pub fn new_pending(
        user_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            status: TransactionStatus::Pending,
            gateway_ref: None,
            tier_purchased: tier,
            expires_at: now + Duration::days(ENTITLEMENT_PERIOD_DAYS),
            gateway_data: Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `status` unless already completed. Returns the transition.
    pub fn transition(&mut self, status: TransactionStatus, now: DateTime<Utc>) -> StatusTransition {
        let previous = self.status;
        if previous != TransactionStatus::Completed {
            self.status = status;
        }
        self.updated_at = now;

        StatusTransition {
            previous,
            current: self.status,
        }
    }
}

/// Result of a conditional status write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: TransactionStatus,
    pub current: TransactionStatus,
}

impl StatusTransition {
    /// This write moved the transaction into `completed`
    pub fn entered_completed(&self) -> bool {
        self.previous != TransactionStatus::Completed && self.current == TransactionStatus::Completed
    }
}

/// Shallow-merge `patch` into `target`; non-object targets are replaced.
pub fn merge_metadata(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                existing.insert(key, value);
            }
        }
        (_, Value::Null) => {}
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn pending() -> PaymentTransaction {
        PaymentTransaction::new_pending("u1", dec!(9.99), "USD", Tier::Premium, Utc::now())
    }

    #[test]
    fn new_pending_grants_thirty_days() {
        let tx = pending();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.expires_at - tx.created_at, Duration::days(30));
        assert!(tx.gateway_ref.is_none());
    }

    #[test]
    fn completed_is_sticky() {
        let mut tx = pending();
        let first = tx.transition(TransactionStatus::Completed, Utc::now());
        assert!(first.entered_completed());

        let replay = tx.transition(TransactionStatus::Completed, Utc::now());
        assert!(!replay.entered_completed());

        let regression = tx.transition(TransactionStatus::Failed, Utc::now());
        assert_eq!(regression.current, TransactionStatus::Completed);
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn merge_keeps_existing_keys() {
        let mut data = json!({"order_id": "premium_u1", "payment_url": "https://pay"});
        merge_metadata(&mut data, json!({"webhook_payload": {"status": "paid"}}));

        assert_eq!(data["order_id"], "premium_u1");
        assert_eq!(data["webhook_payload"]["status"], "paid");

        merge_metadata(&mut data, Value::Null);
        assert_eq!(data["payment_url"], "https://pay");
    }
}
