//! Cryptographic Primitives
//!
//! - Prime-order group abstraction (Ristretto255)
//! - Schnorr key pairs and wallet keys
//! - SHA-256 / HMAC / HKDF helpers

pub mod group;
pub mod hash;
pub mod keys;

pub use group::{Group, Ristretto};
pub use hash::{canonical_hash, canonical_json, hashed_label, sha256, sha256_multi};
pub use keys::{KeyPair, Signature, WalletKeys};
