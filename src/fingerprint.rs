//! Exchange fingerprinting for log correlation

use sha2::{Digest, Sha256};

/// Compute SHA-256 fingerprint of a method and URL
///
/// The method is uppercase normalized so that fingerprints agree with the
/// case-insensitive method comparison used during playback.
#[must_use]
pub fn fingerprint_exchange(method: &str, url: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();

    let method = method.to_uppercase();
    hasher.update((method.len() as u32).to_le_bytes());
    hasher.update(method.as_bytes());

    let url = url.trim();
    hasher.update((url.len() as u32).to_le_bytes());
    hasher.update(url.as_bytes());

    hasher.finalize().into()
}

/// Short hex identifier used in log lines
#[must_use]
pub fn short_id(method: &str, url: &str) -> String {
    hex::encode(&fingerprint_exchange(method, url)[..8])
}
