//! Request-derived cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request.
///
/// `vary` carries the request header values the key must distinguish on;
/// pass an empty string when nothing varies.
pub fn compute_cache_key(method: &str, url: &str, vary: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(vary.as_bytes());
    hex::encode(hasher.finalize())
}
