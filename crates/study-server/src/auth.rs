//! Bearer Token Authentication
//!
//! Identity is issued elsewhere; this server only validates HS256 tokens and
//! reads the user id (`sub`) and optional email from them.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys").finish_non_exhaustive()
    }
}

impl AuthKeys {
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
        let bytes = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Mint a token (local tooling and tests)
    pub fn issue(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.required_spec_claims.insert("exp".to_string());
        validation.required_spec_claims.insert("sub".to_string());

        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Authenticated caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::unauthorized)?;

        let claims = state.auth.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ApiError::unauthorized()
        })?;

        if claims.sub.trim().is_empty() {
            return Err(ApiError::unauthorized());
        }

        Ok(Self {
            id: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            sub: "user-1".into(),
            email: Some("a@example.com".into()),
            exp: usize::try_from(Utc::now().timestamp() + exp_offset).unwrap(),
        }
    }

    #[test]
    fn round_trips_claims() {
        let keys = AuthKeys::from_secret("0123456789abcdef0123456789abcdef");
        let token = keys.issue(&claims(3600)).unwrap();
        assert_eq!(keys.decode(&token).unwrap().sub, "user-1");
    }

    #[test]
    fn rejects_expired_and_foreign_tokens() {
        let keys = AuthKeys::from_secret("0123456789abcdef0123456789abcdef");
        let expired = keys.issue(&claims(-3600)).unwrap();
        assert!(keys.decode(&expired).is_err());

        let other = AuthKeys::from_secret("another-secret-another-secret-xx");
        let foreign = other.issue(&claims(3600)).unwrap();
        assert!(keys.decode(&foreign).is_err());
        assert!(keys.decode("not.a.token").is_err());
    }
}
