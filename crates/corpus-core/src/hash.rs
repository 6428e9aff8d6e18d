//! Content hashing
//!
//! SHA-256 over encoded payload bytes, rendered as lowercase hex. The hash
//! is the deduplication key: identical encoded content always produces the
//! same digest.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `bytes`, hex-encoded (64 characters)
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_64_hex_chars() {
        let digest = content_hash(b"hello");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
        assert_ne!(content_hash(b"aaa"), content_hash(b"bbb"));
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
