//! Signed token for local-backend read URLs.
//!
//! Payload: expiry_ts (u64 BE) || storage_key (utf-8, variable length).
//! Token = base64url(payload || HMAC-SHA256(secret, payload)).
//!
//! The S3 backend delegates URL signing to the provider; this module gives
//! the local filesystem backend equivalent time-limited semantics so TTL
//! behavior is identical across backends.

use crate::traits::{StorageError, StorageResult};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32; // SHA256

/// Build a signed read token for a storage key.
pub fn create(storage_key: &str, expires_in: Duration, secret: &[u8]) -> String {
    let expiry_ts = SystemTime::now()
        .checked_add(expires_in)
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let key_bytes = storage_key.as_bytes();
    let mut payload = Vec::with_capacity(EXPIRY_LEN + key_bytes.len());
    payload.extend_from_slice(&expiry_ts.to_be_bytes());
    payload.extend_from_slice(key_bytes);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(&payload);
    let tag = mac.finalize().into_bytes();

    let mut token_bytes = payload;
    token_bytes.extend_from_slice(&tag);

    base64_url_encode(&token_bytes)
}

/// Verify a token and return the storage key it grants access to.
pub fn verify(token: &str, secret: &[u8]) -> StorageResult<String> {
    let decoded = base64_url_decode(token)
        .map_err(|_| StorageError::SigningFailed("Invalid read token".to_string()))?;
    if decoded.len() < EXPIRY_LEN + MAC_LEN + 1 {
        return Err(StorageError::SigningFailed(
            "Invalid read token".to_string(),
        ));
    }
    let (payload, tag) = decoded.split_at(decoded.len() - MAC_LEN);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(payload);
    mac.verify_slice(tag)
        .map_err(|_| StorageError::SigningFailed("Invalid read token".to_string()))?;

    let expiry_ts = u64::from_be_bytes(
        payload[0..EXPIRY_LEN]
            .try_into()
            .map_err(|_| StorageError::SigningFailed("Invalid read token".to_string()))?,
    );
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if now > expiry_ts {
        return Err(StorageError::SigningFailed(
            "Read token has expired".to_string(),
        ));
    }

    String::from_utf8(payload[EXPIRY_LEN..].to_vec())
        .map_err(|_| StorageError::SigningFailed("Invalid read token".to_string()))
}

fn base64_url_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s)
}
