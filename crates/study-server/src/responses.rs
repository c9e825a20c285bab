//! Success Envelope

use axum::Json;
use axum::body::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// `{ success: true, data }`
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        success: true,
        data,
    }))
}

/// Parse a JSON body, answering malformed input in the error envelope
pub fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Malformed request body");
        ApiError::bad_request("Request body must be valid JSON")
    })
}
