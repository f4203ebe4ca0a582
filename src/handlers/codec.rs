//! Base64url-wrapped JSON, used to carry flow state through query strings.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Compact JSON, base64url with padding.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(URL_SAFE.encode(serde_json::to_vec(value)?))
}

/// Accepts padded and unpadded input.
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, CodecError> {
    let encoded = encoded.trim();
    let bytes = match URL_SAFE.decode(encoded) {
        Ok(bytes) => bytes,
        Err(_) => URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?,
    };
    Ok(serde_json::from_slice(&bytes)?)
}
