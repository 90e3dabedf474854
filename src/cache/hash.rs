//! Content digests used as cache keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of a serializable value as URL-safe base64.
///
/// The value is serialized to JSON before hashing, so equal values always
/// produce equal digests. The result is safe to use as a file name.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(digest_bytes(&json))
}

/// SHA-256 of raw bytes as URL-safe base64 without padding.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
