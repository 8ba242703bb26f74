//! Digests over canonical keys.
//!
//! Canonical keys can be as large as the documents they describe, so log
//! lines and diagnostics carry a fixed-size digest instead:
//!
//! ```text
//! SHA-256(canonical_key_bytes) -> 64 hex chars
//! ```
//!
//! The digest is not used for identity. Two keys are equal iff their bytes are
//! equal; the store compares full keys.
//!
//! # Examples
//!
//! ```rust
//! use canonical::hash_canonical_bytes;
//!
//! let digest = hash_canonical_bytes(br#"{"a":1}"#);
//! assert_eq!(digest.len(), 64);
//! assert_eq!(digest, hash_canonical_bytes(br#"{"a":1}"#));
//! ```

use sha2::{Digest, Sha256};

/// Hash canonical key bytes with SHA-256 and return a lowercase hex digest.
pub fn hash_canonical_bytes(canonical_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(
            hash_canonical_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn different_keys_different_digests() {
        assert_ne!(
            hash_canonical_bytes(br#"{"a":1}"#),
            hash_canonical_bytes(br#"{"a":2}"#)
        );
    }
}
