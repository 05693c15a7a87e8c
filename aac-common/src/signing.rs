//! Signed request helpers for the media host
//!
//! # Algorithm
//!
//! 1. Drop parameters with empty values
//! 2. Sort remaining parameters by key
//! 3. Join as `key=value` pairs separated by `&`
//! 4. Append the shared secret
//! 5. SHA-256 of the concatenated string, as 64 lowercase hex characters
//!
//! The file body, the API key and the signature itself are never part of the
//! signed parameter set; callers pass only the parameters the host signs.
//!
//! This module contains ONLY pure functions. HTTP concerns live in the media
//! host client.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Build the canonical string-to-sign (without the secret)
///
/// # Examples
///
/// ```
/// use aac_common::signing::signature_payload;
///
/// let payload = signature_payload(&[("timestamp", "1315060510"), ("folder", "aac")]);
/// assert_eq!(payload, "folder=aac&timestamp=1315060510");
/// ```
pub fn signature_payload(params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    pairs.sort_by_key(|(k, _)| *k);
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a parameter set with the shared secret
///
/// # Examples
///
/// ```
/// use aac_common::signing::sign_params;
///
/// let signature = sign_params(&[("folder", "aac"), ("timestamp", "1315060510")], "abcd");
/// assert_eq!(signature.len(), 64);
/// ```
pub fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let to_hash = format!("{}{}", signature_payload(params), secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Current Unix time in whole seconds, as the media host expects
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
