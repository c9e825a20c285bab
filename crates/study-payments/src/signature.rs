//! Gateway Signatures
//!
//! Cryptomus signs a payload by serializing it as JSON (without the `sign`
//! field, keys in the order they were produced), base64-encoding that text and
//! computing an HMAC-MD5 over the base64 string with the merchant API key.
//!
//! Verification re-serializes the received object in received order
//! (`serde_json` is built with `preserve_order`) instead of sorting keys.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use md5::Md5;
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

type HmacMd5 = Hmac<Md5>;

/// Name of the signature field inside webhook bodies
pub const SIGN_FIELD: &str = "sign";

/// Serialize `payload` minus its `sign` field, preserving key order.
///
/// Returns `None` for non-object payloads.
pub fn canonical_payload(payload: &Value) -> Option<String> {
    let object = payload.as_object()?;
    let unsigned: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| key.as_str() != SIGN_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    serde_json::to_string(&Value::Object(unsigned)).ok()
}

/// Lowercase hex HMAC-MD5 over the base64 encoding of `bytes`
pub fn sign_bytes(bytes: &[u8], secret_key: &str) -> Option<String> {
    let encoded = STANDARD.encode(bytes);
    let mut mac = HmacMd5::new_from_slice(secret_key.as_bytes()).ok()?;
    mac.update(encoded.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Signature for a JSON payload (any existing `sign` field is ignored)
pub fn sign(payload: &Value, secret_key: &str) -> Option<String> {
    let canonical = canonical_payload(payload)?;
    sign_bytes(canonical.as_bytes(), secret_key)
}

/// Check `provided_signature` against `payload`. Never panics; any malformed
/// input yields `false`.
pub fn verify(payload: &Value, provided_signature: &str, secret_key: &str) -> bool {
    if provided_signature.is_empty() || secret_key.is_empty() {
        return false;
    }

    let Some(expected) = sign(payload, secret_key) else {
        return false;
    };

    let provided = provided_signature.to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Holds the merchant key used for both inbound verification and outbound signing
#[derive(Clone)]
pub struct SignatureVerifier {
    secret_key: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
        }
    }

    /// Verify a parsed webhook using its embedded `sign` field
    pub fn verify_webhook(&self, payload: &Value) -> bool {
        payload
            .get(SIGN_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|provided| verify(payload, provided, &self.secret_key))
    }

    pub fn verify(&self, payload: &Value, provided_signature: &str) -> bool {
        verify(payload, provided_signature, &self.secret_key)
    }

    pub fn sign(&self, payload: &Value) -> Option<String> {
        sign(payload, &self.secret_key)
    }

    /// Sign an outbound request body exactly as it will be sent
    pub fn sign_body(&self, body: &[u8]) -> Option<String> {
        sign_bytes(body, &self.secret_key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const KEY: &str = "merchant-api-key";

    fn webhook() -> Value {
        json!({
            "type": "payment",
            "uuid": "62f88b36-a9d5-4fa6-aa26-e040c3dbf26d",
            "order_id": "premium_u1_tx_1700000000000",
            "amount": "9.99",
            "payment_amount": "10.00",
            "payment_amount_usd": "10.00",
            "merchant_amount": "9.79",
            "commission": "0.20",
            "is_final": true,
            "status": "paid",
            "from": "TXYZ",
            "wallet_address_uuid": null,
            "network": "tron",
            "currency": "USD",
            "payer_currency": "USDT",
            "txid": "abc123"
        })
    }

    fn signed(mut payload: Value) -> Value {
        let signature = sign(&payload, KEY).unwrap();
        payload[SIGN_FIELD] = Value::String(signature);
        payload
    }

    #[test]
    fn valid_signature_verifies() {
        let payload = signed(webhook());
        let provided = payload[SIGN_FIELD].as_str().unwrap().to_string();

        assert!(verify(&payload, &provided, KEY));
        assert!(SignatureVerifier::new(KEY).verify_webhook(&payload));
    }

    #[test]
    fn matches_reference_encoding() {
        let payload = json!({"b": "2", "a": 1});
        let canonical = canonical_payload(&payload).unwrap();
        // received order, not sorted
        assert_eq!(canonical, r#"{"b":"2","a":1}"#);

        let expected = {
            let encoded = STANDARD.encode(canonical.as_bytes());
            let mut mac = HmacMd5::new_from_slice(KEY.as_bytes()).unwrap();
            mac.update(encoded.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        };
        assert_eq!(sign(&payload, KEY).unwrap(), expected);
        assert_eq!(expected.len(), 32);
    }

    #[test]
    fn key_order_matters() {
        let forward = json!({"status": "paid", "uuid": "x"});
        let reversed = json!({"uuid": "x", "status": "paid"});
        assert_ne!(sign(&forward, KEY), sign(&reversed, KEY));
    }

    #[test]
    fn mutated_payload_fails() {
        let payload = signed(webhook());
        let provided = payload[SIGN_FIELD].as_str().unwrap().to_string();

        let mut tampered = payload.clone();
        tampered["status"] = json!("paie");
        assert!(!verify(&tampered, &provided, KEY));

        let mut tampered = payload;
        tampered["amount"] = json!("9.98");
        assert!(!verify(&tampered, &provided, KEY));
    }

    #[test]
    fn single_bit_flip_in_any_signature_byte_fails() {
        let payload = signed(webhook());
        let provided = payload[SIGN_FIELD].as_str().unwrap().to_string();

        for i in 0..provided.len() {
            let mut bytes = provided.clone().into_bytes();
            bytes[i] ^= 0x01;
            let flipped = String::from_utf8_lossy(&bytes).into_owned();
            assert!(!verify(&payload, &flipped, KEY), "flip at {i} verified");
        }
    }

    #[test]
    fn wrong_key_fails() {
        let payload = signed(webhook());
        let provided = payload[SIGN_FIELD].as_str().unwrap().to_string();
        assert!(!verify(&payload, &provided, "another-key"));
    }

    #[test]
    fn malformed_inputs_return_false() {
        let payload = signed(webhook());
        assert!(!verify(&payload, "", KEY));
        assert!(!verify(&payload, "not-hex-at-all", KEY));
        assert!(!verify(&json!([1, 2, 3]), "00", KEY));
        assert!(!verify(&Value::Null, "00", KEY));
        assert!(!verify(&payload, "ab", ""));

        let verifier = SignatureVerifier::new(KEY);
        assert!(!verifier.verify_webhook(&webhook()));
        assert!(!verifier.verify_webhook(&json!({"sign": 42})));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let payload = signed(webhook());
        let provided = payload[SIGN_FIELD].as_str().unwrap().to_ascii_uppercase();
        assert!(verify(&payload, &provided, KEY));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let rendered = format!("{:?}", SignatureVerifier::new(KEY));
        assert!(!rendered.contains(KEY));
    }
}
