//! Common Types for ByteChan

use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit hash (32 bytes), hex encoded on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Hash256 {
    /// Zero hash
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Try to create from slice
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Self::try_from_slice(&bytes)
    }

    /// Number of leading zero hex digits
    pub fn leading_zero_nibbles(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte < 0x10 {
                count += 1;
            }
            break;
        }
        count
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", &hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}...{}", &hex::encode(&self.0[..4]), &hex::encode(&self.0[28..]))
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Hash256> for [u8; 32] {
    fn from(hash: Hash256) -> Self {
        hash.0
    }
}

/// Unix epoch milliseconds
pub type Timestamp = u64;

/// Block height
pub type Height = u64;

/// Amount in atomic units (see `constants::COIN`)
pub type Amount = u64;

/// Current wall-clock time in milliseconds
pub fn now_ms() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Serde adapter: list of 32-byte values as hex strings
pub mod hex_list {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error> {
        let strings: Vec<String> = Vec::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| {
                let mut out = [0u8; 32];
                hex::decode_to_slice(s, &mut out).map_err(D::Error::custom)?;
                Ok(out)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_hex() {
        let hash = Hash256([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
                           0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                           0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                           0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

        let hex = hash.to_hex();
        let parsed = Hash256::from_hex(&hex).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_hash256_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert!(!Hash256([1u8; 32]).is_zero());
    }

    #[test]
    fn test_hash256_json_is_hex() {
        let json = serde_json::to_string(&Hash256([0xab; 32])).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }

    #[test]
    fn test_leading_zero_nibbles() {
        let mut bytes = [0xffu8; 32];
        assert_eq!(Hash256(bytes).leading_zero_nibbles(), 0);
        bytes[0] = 0x0f;
        assert_eq!(Hash256(bytes).leading_zero_nibbles(), 1);
        bytes[0] = 0x00;
        bytes[1] = 0x01;
        assert_eq!(Hash256(bytes).leading_zero_nibbles(), 3);
        assert_eq!(Hash256::ZERO.leading_zero_nibbles(), 64);
    }

    #[test]
    fn test_now_is_after_genesis() {
        assert!(now_ms() > crate::constants::GENESIS_TIMESTAMP);
    }
}
