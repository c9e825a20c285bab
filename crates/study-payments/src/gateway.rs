//! Cryptomus Gateway Integration
//!
//! Hosted payment pages: we create an invoice, redirect the user to the
//! returned URL, and the gateway reports progress through the webhook.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{PaymentError, Result};
use crate::signature::SignatureVerifier;
use crate::transaction::TransactionStatus;

const DEFAULT_API_URL: &str = "https://api.cryptomus.com";

/// Lifetime of a hosted payment session
pub const SESSION_LIFETIME_SECS: u32 = 2 * 60 * 60;

/// Payment status vocabulary reported by the gateway
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayStatus {
    Paid,
    PaidOver,
    Fail,
    Cancel,
    SystemFail,
    Refund,
    RefundFail,
    Process,
    ConfirmCheck,
    NotPaid,
    Unknown(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "paid" => Self::Paid,
            "paid_over" => Self::PaidOver,
            "fail" => Self::Fail,
            "cancel" => Self::Cancel,
            "system_fail" => Self::SystemFail,
            "refund" => Self::Refund,
            "refund_fail" => Self::RefundFail,
            "process" => Self::Process,
            "confirm_check" => Self::ConfirmCheck,
            "not_paid" => Self::NotPaid,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Paid => "paid",
            Self::PaidOver => "paid_over",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::SystemFail => "system_fail",
            Self::Refund => "refund",
            Self::RefundFail => "refund_fail",
            Self::Process => "process",
            Self::ConfirmCheck => "confirm_check",
            Self::NotPaid => "not_paid",
            Self::Unknown(raw) => raw,
        }
    }

    /// Terminal success
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid | Self::PaidOver)
    }

    /// Local status this gateway status maps to. Unknown values stay pending.
    pub const fn local_status(&self) -> TransactionStatus {
        match self {
            Self::Paid | Self::PaidOver => TransactionStatus::Completed,
            Self::Fail | Self::Cancel | Self::SystemFail | Self::Refund | Self::RefundFail => {
                TransactionStatus::Failed
            }
            Self::Process | Self::ConfirmCheck | Self::NotPaid | Self::Unknown(_) => {
                TransactionStatus::Pending
            }
        }
    }
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice creation request
#[derive(Clone, Debug, Serialize)]
pub struct InvoiceRequest {
    pub amount: Decimal,
    pub currency: String,
    pub order_id: String,
    pub url_return: String,
    pub url_callback: String,
    pub is_payment_multiple: bool,
    pub lifetime: u32,
}

/// Hosted payment page returned by the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invoice {
    /// Gateway reference for this payment
    pub uuid: String,
    pub order_id: String,
    pub url: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payment gateway operations the core depends on
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment session
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice>;

    /// Current status of a payment by gateway reference
    async fn payment_status(&self, gateway_ref: &str) -> Result<GatewayStatus>;
}

/// Cryptomus client configuration
#[derive(Clone)]
pub struct CryptomusConfig {
    pub api_url: String,
    pub merchant_id: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CryptomusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptomusConfig")
            .field("api_url", &self.api_url)
            .field("merchant_id", &self.merchant_id)
            .finish_non_exhaustive()
    }
}

impl CryptomusConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Config(format!("{key} not set")))
        };

        Ok(Self {
            api_url: lookup("CRYPTOMUS_API_URL")
                .map_or_else(|| DEFAULT_API_URL.to_string(), |u| u.trim_end_matches('/').to_string()),
            merchant_id: required("CRYPTOMUS_MERCHANT_ID")?,
            api_key: required("CRYPTOMUS_API_KEY")?,
            timeout_secs: 30,
        })
    }
}

/// Cryptomus API client
pub struct CryptomusClient {
    http: reqwest::Client,
    config: CryptomusConfig,
    signer: SignatureVerifier,
}

/// `{ state, result?, message? }` envelope used by every endpoint
#[derive(Deserialize)]
struct Envelope<T> {
    state: i64,
    result: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct PaymentInfo {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
}

impl CryptomusClient {
    pub fn new(config: CryptomusConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        let signer = SignatureVerifier::new(config.api_key.clone());

        Ok(Self {
            http,
            config,
            signer,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(CryptomusConfig::from_env()?)
    }

    /// Verifier keyed with the same merchant key (for webhooks)
    pub fn verifier(&self) -> SignatureVerifier {
        self.signer.clone()
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, body: &Value) -> Result<T> {
        let bytes = serde_json::to_vec(body).map_err(|e| PaymentError::Gateway(e.to_string()))?;
        let sign = self
            .signer
            .sign_body(&bytes)
            .ok_or_else(|| PaymentError::Config("invalid merchant key".into()))?;

        let response = self
            .http
            .post(format!("{}{}", self.config.api_url, path))
            .header("merchant", &self.config.merchant_id)
            .header("sign", sign)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|_| {
            PaymentError::Gateway(format!("unexpected gateway response (HTTP {status})"))
        })?;

        if envelope.state != 0 || !status.is_success() {
            return Err(PaymentError::Gateway(envelope.message.unwrap_or_else(|| {
                format!("gateway rejected request (HTTP {status}, state {})", envelope.state)
            })));
        }

        envelope
            .result
            .ok_or_else(|| PaymentError::Gateway("gateway response missing result".into()))
    }
}

#[async_trait]
impl PaymentGateway for CryptomusClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        let body = serde_json::to_value(request).map_err(|e| PaymentError::Gateway(e.to_string()))?;
        let invoice: Invoice = self.post("/v1/payment", &body).await?;

        tracing::info!(
            gateway_ref = %invoice.uuid,
            order_id = %invoice.order_id,
            "Created gateway invoice"
        );
        Ok(invoice)
    }

    async fn payment_status(&self, gateway_ref: &str) -> Result<GatewayStatus> {
        let info: PaymentInfo = self
            .post("/v1/payment/info", &json!({ "uuid": gateway_ref }))
            .await?;

        let raw = info
            .payment_status
            .or(info.status)
            .ok_or_else(|| PaymentError::Gateway("payment info missing status".into()))?;
        Ok(GatewayStatus::parse(&raw))
    }
}
