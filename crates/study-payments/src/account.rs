//! Accounts and Tiers
//!
//! Usage counters and subscription state for a user. Identity is owned by the
//! auth collaborator; accounts are created lazily the first time usage is read.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Subscription tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            _ => Err(crate::error::ValidationError::InvalidTier),
        }
    }
}

/// Monthly generation limits per tier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierLimits {
    pub free_monthly_limit: u32,
    pub premium_monthly_limit: u32,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            free_monthly_limit: 10,
            premium_monthly_limit: 1000,
        }
    }
}

impl TierLimits {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `FREE_TIER_MONTHLY_LIMIT` / `PREMIUM_TIER_MONTHLY_LIMIT`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let parse = |key: &str, default: u32| -> Result<u32> {
            lookup(key).map_or(Ok(default), |raw| {
                raw.trim()
                    .parse()
                    .map_err(|_| PaymentError::Config(format!("{key} must be a non-negative integer")))
            })
        };

        Ok(Self {
            free_monthly_limit: parse("FREE_TIER_MONTHLY_LIMIT", defaults.free_monthly_limit)?,
            premium_monthly_limit: parse(
                "PREMIUM_TIER_MONTHLY_LIMIT",
                defaults.premium_monthly_limit,
            )?,
        })
    }

    pub const fn limit_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free_monthly_limit,
            Tier::Premium => self.premium_monthly_limit,
        }
    }
}

/// Usage and subscription record for a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identity from the auth collaborator
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,

    pub tier: Tier,

    pub monthly_limit: u32,

    pub generated_this_month: u32,

    /// Present iff premium was granted by a completed payment
    pub subscription_expires_at: Option<DateTime<Utc>>,

    /// Start of the current monthly usage period
    pub usage_reset_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a free-tier account
    pub fn new(id: impl Into<String>, email: Option<String>, free_limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email,
            tier: Tier::Free,
            monthly_limit: free_limit,
            generated_this_month: 0,
            subscription_expires_at: None,
            usage_reset_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generations left this month
    pub const fn remaining(&self) -> u32 {
        self.monthly_limit.saturating_sub(self.generated_this_month)
    }

    /// Premium with an expiry still in the future
    pub fn has_active_premium(&self, now: DateTime<Utc>) -> bool {
        self.tier == Tier::Premium && self.subscription_expires_at.is_none_or(|e| e > now)
    }

    /// Whether a grant ending at `expires_at` is already reflected
    pub fn carries_grant(&self, expires_at: DateTime<Utc>) -> bool {
        self.tier == Tier::Premium && self.subscription_expires_at.is_some_and(|e| e >= expires_at)
    }

    /// Downgrade an expired premium subscription. Returns true when changed.
    pub fn expire_premium(&mut self, now: DateTime<Utc>, free_limit: u32) -> bool {
        let expired = self.tier == Tier::Premium
            && self.subscription_expires_at.is_some_and(|e| e < now);

        if expired {
            self.tier = Tier::Free;
            self.monthly_limit = free_limit;
            self.subscription_expires_at = None;
            self.updated_at = now;
        }
        expired
    }

    /// Reset the monthly counter when the calendar month changed. Returns true when changed.
    pub fn roll_usage_period(&mut self, now: DateTime<Utc>) -> bool {
        let same_period = self.usage_reset_at.year() == now.year()
            && self.usage_reset_at.month() == now.month();

        if same_period {
            return false;
        }

        self.generated_this_month = 0;
        self.usage_reset_at = now;
        self.updated_at = now;
        true
    }

    /// Apply a premium grant unless already carried or already lapsed.
    /// Returns true when changed.
    pub fn apply_premium_grant(
        &mut self,
        expires_at: DateTime<Utc>,
        premium_limit: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if expires_at <= now || self.carries_grant(expires_at) {
            return false;
        }

        self.tier = Tier::Premium;
        self.monthly_limit = premium_limit;
        self.subscription_expires_at = Some(expires_at);
        self.updated_at = now;
        true
    }

    /// Count freshly generated cards against the monthly quota
    pub fn record_generated(&mut self, count: u32, now: DateTime<Utc>) {
        self.generated_this_month = self.generated_this_month.saturating_add(count);
        self.updated_at = now;
    }
}
