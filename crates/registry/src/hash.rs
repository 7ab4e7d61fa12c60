//! SHA-256 hashing for API keys.

use sha2::{Digest, Sha256};

/// Hash an API key for storage and lookup.
///
/// The registry never indexes plaintext keys; every lookup hashes the
/// presented key first.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let h1 = hash_key("sk-test-123");
        let h2 = hash_key("sk-test-123");
        let h3 = hash_key("sk-other");

        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 64); // SHA-256 produces 64 hex characters
    }
}
