//! Hash Functions
//!
//! Provides:
//! - SHA-256 (transaction ids, block hashes, address labels)
//! - HMAC-SHA256 (deterministic signing nonces)
//! - HKDF-SHA256 (wallet key separation)
//! - Canonical JSON hashing (sorted keys, compact form)

use crate::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 hash (32 bytes)
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of multiple inputs
pub fn sha256_multi(inputs: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}

/// HMAC-SHA256
pub fn hmac_sha256(key: &[u8], data: &[&[u8]]) -> [u8; 32] {
    use hmac::{Hmac, Mac};
    type HmacSha256 = Hmac<Sha256>;

    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    for part in data {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// HKDF-SHA256 key derivation into a fixed 64-byte block
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8]) -> [u8; 64] {
    use hkdf::Hkdf;

    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut output = [0u8; 64];
    // 64 bytes is far below the 255 * 32 HKDF-SHA256 limit
    if hkdf.expand(info, &mut output).is_err() {
        unreachable!("64-byte HKDF-SHA256 output is always valid");
    }
    output
}

/// Compact JSON with object keys in sorted order.
///
/// `serde_json::Map` is a `BTreeMap` (no `preserve_order`), so going through
/// `Value` sorts every nested object.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&value).map_err(|e| Error::Serialization(e.to_string()))
}

/// SHA-256 of the canonical JSON encoding
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<[u8; 32]> {
    Ok(sha256(&canonical_json(value)?))
}

/// `prefix` followed by the first 20 bytes of SHA-256(data), hex encoded
pub fn hashed_label(prefix: &str, data: &[u8]) -> String {
    let digest = sha256(data);
    format!("{}{}", prefix, hex::encode(&digest[..20]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"hello");
        // Known test vector
        assert_eq!(
            hex::encode(hash),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha256_multi_matches_concat() {
        assert_eq!(sha256_multi(&[b"hel", b"lo"]), sha256(b"hello"));
    }

    #[test]
    fn test_hmac_depends_on_key() {
        assert_ne!(
            hmac_sha256(b"key-1", &[b"message"]),
            hmac_sha256(b"key-2", &[b"message"])
        );
    }

    #[test]
    fn test_hkdf_info_separates_outputs() {
        let a = hkdf_sha256(b"seed material", b"salt", b"spend");
        let b = hkdf_sha256(b"seed material", b"salt", b"view");
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let bytes = canonical_json(&json!({"b": 1, "a": {"d": 2, "c": 3}})).unwrap();
        assert_eq!(bytes, br#"{"a":{"c":3,"d":2},"b":1}"#.to_vec());
    }

    #[test]
    fn test_hashed_label_shape() {
        let label = hashed_label("bc1", b"pubkey");
        assert!(label.starts_with("bc1"));
        assert_eq!(label.len(), 3 + 40);
    }
}
