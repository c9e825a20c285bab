//! Entitlement Gate
//!
//! Every usage read and every generation request goes through here, so
//! expired subscriptions and stale monthly counters are corrected before any
//! quota decision is made.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::{Account, Tier, TierLimits};
use crate::error::{PaymentError, Result};
use crate::store::AccountStore;

/// Usage snapshot returned to clients
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub tier: Tier,
    pub generated_this_month: u32,
    pub monthly_limit: u32,
    pub remaining: u32,
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

impl From<&Account> for Usage {
    fn from(account: &Account) -> Self {
        Self {
            tier: account.tier,
            generated_this_month: account.generated_this_month,
            monthly_limit: account.monthly_limit,
            remaining: account.remaining(),
            subscription_expires_at: account.subscription_expires_at,
        }
    }
}

/// Result of applying a premium grant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    Upgraded,
    AlreadyGranted,
}

/// Apply a completed payment's premium grant to the account.
///
/// Idempotent: an account that already carries a grant ending at or after
/// `expires_at` is left untouched, as is any account when the grant has
/// already lapsed.
pub async fn grant_premium(
    accounts: &dyn AccountStore,
    user_id: &str,
    expires_at: DateTime<Utc>,
    limits: TierLimits,
    now: DateTime<Utc>,
) -> Result<GrantOutcome> {
    if accounts.get_account(user_id).await?.is_none() {
        accounts
            .insert_account(Account::new(user_id, None, limits.free_monthly_limit, now))
            .await?;
    }

    let premium_limit = limits.premium_monthly_limit;
    let (account, changed) = accounts
        .update_account(user_id, &|account| {
            account.apply_premium_grant(expires_at, premium_limit, now)
        })
        .await?
        .ok_or_else(|| PaymentError::Storage(format!("account {user_id} vanished during upgrade")))?;

    if changed {
        tracing::info!(
            user_id = %account.id,
            expires_at = %expires_at,
            monthly_limit = account.monthly_limit,
            "Upgraded account to premium"
        );
        Ok(GrantOutcome::Upgraded)
    } else {
        tracing::debug!(user_id = %account.id, "Premium grant already applied");
        Ok(GrantOutcome::AlreadyGranted)
    }
}

/// Quota and subscription enforcement
#[derive(Clone)]
pub struct EntitlementGate {
    accounts: Arc<dyn AccountStore>,
    limits: TierLimits,
}

impl EntitlementGate {
    pub fn new(accounts: Arc<dyn AccountStore>, limits: TierLimits) -> Self {
        Self { accounts, limits }
    }

    pub const fn limits(&self) -> TierLimits {
        self.limits
    }

    /// Current usage, creating the account and applying expiry/reset as needed
    pub async fn usage(&self, user_id: &str, email: Option<&str>, now: DateTime<Utc>) -> Result<Usage> {
        if self.accounts.get_account(user_id).await?.is_none() {
            let account = Account::new(
                user_id,
                email.map(str::to_string),
                self.limits.free_monthly_limit,
                now,
            );
            self.accounts.insert_account(account).await?;
            tracing::info!(user_id, "Created account on first usage read");
        }

        let free_limit = self.limits.free_monthly_limit;
        let (account, changed) = self
            .accounts
            .update_account(user_id, &|account| {
                let downgraded = account.expire_premium(now, free_limit);
                let reset = account.roll_usage_period(now);
                downgraded || reset
            })
            .await?
            .ok_or_else(|| PaymentError::Storage(format!("account {user_id} missing after insert")))?;

        if changed {
            tracing::debug!(
                user_id,
                tier = %account.tier,
                generated = account.generated_this_month,
                "Refreshed account entitlements"
            );
        }

        Ok(Usage::from(&account))
    }

    /// Usage if at least one generation remains, `QuotaExceeded` otherwise
    pub async fn check_quota(&self, user_id: &str, email: Option<&str>, now: DateTime<Utc>) -> Result<Usage> {
        let usage = self.usage(user_id, email, now).await?;
        if usage.remaining == 0 {
            tracing::info!(user_id, limit = usage.monthly_limit, "Monthly quota exhausted");
            return Err(PaymentError::QuotaExceeded(usage));
        }
        Ok(usage)
    }

    /// Count a successful generation against the monthly quota
    pub async fn record_generation(&self, user_id: &str, count: u32, now: DateTime<Utc>) -> Result<Usage> {
        let (account, _) = self
            .accounts
            .update_account(user_id, &|account| {
                account.roll_usage_period(now);
                account.record_generated(count, now);
                true
            })
            .await?
            .ok_or_else(|| PaymentError::Storage(format!("account {user_id} not found")))?;

        Ok(Usage::from(&account))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::store::MemoryStore;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    fn gate(store: &Arc<MemoryStore>) -> EntitlementGate {
        EntitlementGate::new(store.clone(), TierLimits::default())
    }

    #[tokio::test]
    async fn first_read_creates_free_account() {
        let store = Arc::new(MemoryStore::new());
        let usage = gate(&store)
            .usage("u1", Some("a@example.com"), at(2025, 4, 2))
            .await
            .unwrap();

        assert_eq!(usage.tier, Tier::Free);
        assert_eq!(usage.monthly_limit, 10);
        assert_eq!(usage.remaining, 10);
        let stored = store.get_account("u1").await.unwrap().unwrap();
        assert_eq!(stored.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn exhausted_quota_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let now = at(2025, 4, 2);
        gate.usage("u1", None, now).await.unwrap();
        gate.record_generation("u1", 10, now).await.unwrap();

        let usage = gate.usage("u1", None, now).await.unwrap();
        assert_eq!(usage.remaining, 0);

        match gate.check_quota("u1", None, now).await {
            Err(PaymentError::QuotaExceeded(usage)) => assert_eq!(usage.generated_this_month, 10),
            other => panic!("expected quota error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_premium_downgrades_on_read() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let start = at(2025, 4, 2);
        let expires = start + Duration::days(30);
        grant_premium(store.as_ref(), "u1", expires, gate.limits(), start)
            .await
            .unwrap();
        assert_eq!(gate.usage("u1", None, start).await.unwrap().monthly_limit, 1000);

        let usage = gate.usage("u1", None, expires + Duration::seconds(1)).await.unwrap();
        assert_eq!(usage.tier, Tier::Free);
        assert_eq!(usage.monthly_limit, 10);
        assert_eq!(usage.subscription_expires_at, None);
    }

    #[tokio::test]
    async fn counter_resets_in_new_month() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        gate.usage("u1", None, at(2025, 4, 2)).await.unwrap();
        gate.record_generation("u1", 7, at(2025, 4, 20)).await.unwrap();

        let usage = gate.usage("u1", None, at(2025, 5, 1)).await.unwrap();
        assert_eq!(usage.generated_this_month, 0);
        assert_eq!(usage.remaining, 10);
    }

    #[tokio::test]
    async fn generation_across_month_boundary_counts_in_new_month() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let last_day = Utc.with_ymd_and_hms(2025, 4, 30, 23, 59, 59).unwrap();
        gate.usage("u1", None, last_day).await.unwrap();
        gate.record_generation("u1", 3, last_day).await.unwrap();
        gate.check_quota("u1", None, last_day).await.unwrap();

        let after_midnight = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 1).unwrap();
        let recorded = gate.record_generation("u1", 4, after_midnight).await.unwrap();
        assert_eq!(recorded.generated_this_month, 4);

        let usage = gate.usage("u1", None, after_midnight).await.unwrap();
        assert_eq!(usage.generated_this_month, 4);
        assert_eq!(usage.remaining, 6);
    }

    #[tokio::test]
    async fn lapsed_grant_does_not_reupgrade() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let start = at(2025, 4, 2);
        let expires = start + Duration::days(30);
        grant_premium(store.as_ref(), "u1", expires, gate.limits(), start)
            .await
            .unwrap();

        let later = expires + Duration::days(1);
        gate.usage("u1", None, later).await.unwrap();
        let snapshot = store.get_account("u1").await.unwrap();

        let outcome = grant_premium(store.as_ref(), "u1", expires, gate.limits(), later)
            .await
            .unwrap();
        assert_eq!(outcome, GrantOutcome::AlreadyGranted);
        assert_eq!(store.get_account("u1").await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn grant_is_applied_once() {
        let store = Arc::new(MemoryStore::new());
        let now = at(2025, 4, 2);
        let expires = now + Duration::days(30);
        let limits = TierLimits::default();

        let first = grant_premium(store.as_ref(), "u1", expires, limits, now).await.unwrap();
        let snapshot = store.get_account("u1").await.unwrap();
        let second = grant_premium(store.as_ref(), "u1", expires, limits, now + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(first, GrantOutcome::Upgraded);
        assert_eq!(second, GrantOutcome::AlreadyGranted);
        assert_eq!(store.get_account("u1").await.unwrap(), snapshot);
    }
}
