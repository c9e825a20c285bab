//! Server Configuration
//!
//! Everything comes from the environment (after `.env` is loaded). Payments
//! and generation are optional: without credentials the corresponding
//! routes answer 503 instead of the server refusing to start.

use study_payments::{CryptomusConfig, TierLimits};
use study_runtime::GroqConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_MODELS: [&str; 4] = [
    "llama-3.3-70b-versatile",
    "openai/gpt-oss-120b",
    "llama-3.1-8b-instant",
    "openai/gpt-oss-20b",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub site_url: String,
    pub jwt_secret: String,
    pub limits: TierLimits,
    pub models: Vec<String>,
    pub groq: Option<GroqConfig>,
    pub cryptomus: Option<CryptomusConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = present("AUTH_JWT_SECRET").ok_or(ConfigError::Missing("AUTH_JWT_SECRET"))?;

        let limits = TierLimits::from_lookup(&lookup).map_err(|e| ConfigError::Invalid {
            key: "TIER_MONTHLY_LIMIT",
            message: e.to_string(),
        })?;

        let models = present("GROQ_MODELS").map_or_else(
            || DEFAULT_MODELS.iter().map(ToString::to_string).collect(),
            |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            },
        );
        if models.is_empty() {
            return Err(ConfigError::Invalid {
                key: "GROQ_MODELS",
                message: "no models listed".into(),
            });
        }

        let groq = match present("GROQ_API_KEY") {
            None => None,
            Some(_) => Some(GroqConfig::from_lookup(&lookup).map_err(|e| ConfigError::Invalid {
                key: "GROQ_API_KEY",
                message: e.to_string(),
            })?),
        };

        let cryptomus = if present("CRYPTOMUS_API_KEY").is_some()
            || present("CRYPTOMUS_MERCHANT_ID").is_some()
        {
            Some(CryptomusConfig::from_lookup(&lookup).map_err(|e| ConfigError::Invalid {
                key: "CRYPTOMUS_API_KEY",
                message: e.to_string(),
            })?)
        } else {
            None
        };

        Ok(Self {
            bind_addr: present("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            site_url: present("SITE_URL")
                .unwrap_or_else(|| DEFAULT_SITE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            jwt_secret,
            limits,
            models,
            groq,
            cryptomus,
        })
    }
}
