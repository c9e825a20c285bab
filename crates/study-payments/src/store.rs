//! Persistence Collaborators
//!
//! The payment core only needs a handful of operations from the data store:
//! lookups with owner filters, insert-if-absent, and conditional updates that
//! run under the store's own isolation (row lock, transaction, or the
//! in-memory write lock below).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::account::Account;
use crate::error::Result;
use crate::transaction::{PaymentTransaction, StatusTransition, TransactionStatus, merge_metadata};

/// Conditional account mutation: returns true when the account was changed
pub type AccountUpdate<'a> = &'a (dyn Fn(&mut Account) -> bool + Send + Sync);

/// Account storage
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get account by user id
    async fn get_account(&self, user_id: &str) -> Result<Option<Account>>;

    /// Insert unless present; returns the stored account (existing wins)
    async fn insert_account(&self, account: Account) -> Result<Account>;

    /// Apply `update` atomically; `None` when the account does not exist.
    /// Returns the account after the update and whether it changed.
    async fn update_account(
        &self,
        user_id: &str,
        update: AccountUpdate<'_>,
    ) -> Result<Option<(Account, bool)>>;
}

/// Transaction storage
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>>;

    /// Lookup filtered by owner, so other users' rows read as absent
    async fn get_owned_transaction(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<PaymentTransaction>>;

    async fn find_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<PaymentTransaction>>;

    /// Most recent pending transaction for the user created at or after `since`
    async fn latest_pending_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<PaymentTransaction>>;

    /// Record the gateway reference and merge metadata
    async fn attach_gateway_ref(
        &self,
        id: Uuid,
        gateway_ref: &str,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentTransaction>>;

    /// Set `status` unless the row is already completed; merge metadata either way
    async fn transition_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>>;
}

/// In-memory store (for development and tests)
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    transactions: RwLock<HashMap<Uuid, PaymentTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, user_id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn insert_account(&self, account: Account) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.entry(account.id.clone()).or_insert(account).clone())
    }

    async fn update_account(
        &self,
        user_id: &str,
        update: AccountUpdate<'_>,
    ) -> Result<Option<(Account, bool)>> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.get_mut(user_id).map(|account| {
            let changed = update(account);
            (account.clone(), changed)
        }))
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        self.transactions
            .write()
            .await
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>> {
        Ok(self.transactions.read().await.get(&id).cloned())
    }

    async fn get_owned_transaction(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .get(&id)
            .filter(|tx| tx.user_id == user_id)
            .cloned())
    }

    async fn find_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .find(|tx| tx.gateway_ref.as_deref() == Some(gateway_ref))
            .cloned())
    }

    async fn latest_pending_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.status == TransactionStatus::Pending
                    && tx.created_at >= since
            })
            .max_by_key(|tx| tx.created_at)
            .cloned())
    }

    async fn attach_gateway_ref(
        &self,
        id: Uuid,
        gateway_ref: &str,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentTransaction>> {
        let mut transactions = self.transactions.write().await;
        Ok(transactions.get_mut(&id).map(|tx| {
            tx.gateway_ref = Some(gateway_ref.to_string());
            merge_metadata(&mut tx.gateway_data, metadata);
            tx.updated_at = now;
            tx.clone()
        }))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>> {
        let mut transactions = self.transactions.write().await;
        Ok(transactions.get_mut(&id).map(|tx| {
            merge_metadata(&mut tx.gateway_data, metadata);
            tx.transition(status, now)
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::account::Tier;

    fn pending(user: &str, now: DateTime<Utc>) -> PaymentTransaction {
        PaymentTransaction::new_pending(user, dec!(5), "USD", Tier::Premium, now)
    }

    #[tokio::test]
    async fn insert_account_keeps_existing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut first = Account::new("u1", Some("a@example.com".into()), 10, now);
        first.generated_this_month = 4;
        store.insert_account(first).await.unwrap();

        let stored = store
            .insert_account(Account::new("u1", None, 10, now))
            .await
            .unwrap();
        assert_eq!(stored.generated_this_month, 4);
        assert_eq!(stored.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn update_missing_account_is_none() {
        let store = MemoryStore::new();
        let result = store.update_account("ghost", &|_| true).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn owned_lookup_hides_other_users() {
        let store = MemoryStore::new();
        let tx = pending("owner", Utc::now());
        store.insert_transaction(&tx).await.unwrap();

        assert!(store.get_owned_transaction(tx.id, "owner").await.unwrap().is_some());
        assert!(store.get_owned_transaction(tx.id, "intruder").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_window_filters_by_age_and_status() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let old = pending("u1", now - Duration::minutes(45));
        store.insert_transaction(&old).await.unwrap();
        let since = now - Duration::minutes(30);
        assert!(store.latest_pending_since("u1", since).await.unwrap().is_none());

        let fresh = pending("u1", now - Duration::minutes(5));
        store.insert_transaction(&fresh).await.unwrap();
        let found = store.latest_pending_since("u1", since).await.unwrap().unwrap();
        assert_eq!(found.id, fresh.id);

        store
            .transition_status(fresh.id, TransactionStatus::Failed, Value::Null, now)
            .await
            .unwrap();
        assert!(store.latest_pending_since("u1", since).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transition_merges_metadata_and_guards_completed() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let tx = pending("u1", now);
        store.insert_transaction(&tx).await.unwrap();
        store
            .attach_gateway_ref(tx.id, "gw-1", json!({"order_id": "premium_u1"}), now)
            .await
            .unwrap();

        let done = store
            .transition_status(tx.id, TransactionStatus::Completed, json!({"n": 1}), now)
            .await
            .unwrap()
            .unwrap();
        assert!(done.entered_completed());

        let late = store
            .transition_status(tx.id, TransactionStatus::Failed, json!({"n": 2}), now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(late.current, TransactionStatus::Completed);

        let stored = store.find_by_gateway_ref("gw-1").await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(stored.gateway_data["order_id"], "premium_u1");
        assert_eq!(stored.gateway_data["n"], 2);
    }
}
