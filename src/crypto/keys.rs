//! Schnorr Keys
//!
//! Key pairs over any `Group`:
//! - random or seed-derived generation
//! - deterministic Schnorr signatures (nonce = HMAC-SHA256(secret, message))
//! - `bc1` address derivation
//!
//! `WalletKeys` bundles the spend and view pairs a stealth recipient needs.
//! Secrets are wiped on drop and never printed.

use crate::constants::{ADDRESS_PREFIX, KEY_IMAGE_PREFIX, MIN_SEED_LEN};
use crate::crypto::group::{Group, Ristretto};
use crate::crypto::hash::{hashed_label, hkdf_sha256, hmac_sha256};
use crate::privacy::ring::Lsag;
use crate::privacy::stealth::StealthAddress;
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

const SEED_DOMAIN: &[u8] = b"bytechan-keypair-seed";
const NONCE_DOMAIN: &[u8] = b"bytechan-schnorr-nonce";
const CHALLENGE_DOMAIN: &[u8] = b"bytechan-schnorr-challenge";
const WALLET_SALT: &[u8] = b"bytechan-wallet";

/// 64-byte Schnorr signature `(R, s)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "hex::serde")]
    pub r: [u8; 32],
    #[serde(with = "hex::serde")]
    pub s: [u8; 32],
}

impl Signature {
    /// `R || s`
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Try to create from slice
    pub fn try_from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 64 {
            return Err(Error::InvalidInput("Signature must be 64 bytes".into()));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&slice[..32]);
        s.copy_from_slice(&slice[32..]);
        Ok(Self { r, s })
    }
}

/// Secret scalar and its public point
pub struct KeyPair<G: Group = Ristretto> {
    secret: G::Scalar,
    public: G::Point,
}

impl<G: Group> KeyPair<G> {
    /// Generate new random keypair
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(G::random_scalar(rng))
    }

    /// Wrap an existing secret scalar
    pub fn from_secret(secret: G::Scalar) -> Self {
        let public = G::mul_base(&secret);
        Self { secret, public }
    }

    /// Deterministic keypair from seed material (at least 16 bytes)
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        check_seed(seed)?;
        let secret = G::hash_to_scalar(SEED_DOMAIN, &[seed]);
        if secret == G::scalar_from_u64(0) {
            return Err(Error::InvalidSeed("seed maps to the zero scalar".into()));
        }
        Ok(Self::from_secret(secret))
    }

    /// `from_seed` over a hex-encoded seed
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self> {
        let mut seed = hex::decode(seed_hex.trim())
            .map_err(|e| Error::InvalidSeed(format!("malformed hex: {}", e)))?;
        let keypair = Self::from_seed(&seed);
        seed.zeroize();
        keypair
    }

    /// Get public key
    pub fn public_key(&self) -> &G::Point {
        &self.public
    }

    /// Canonical public key encoding
    pub fn public_bytes(&self) -> [u8; 32] {
        G::encode_point(&self.public)
    }

    /// Get secret key (use carefully)
    pub fn secret(&self) -> &G::Scalar {
        &self.secret
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let mut secret_bytes = G::encode_scalar(&self.secret);
        let mut seed = hmac_sha256(&secret_bytes, &[message]);
        secret_bytes.zeroize();

        let mut k = G::hash_to_scalar(NONCE_DOMAIN, &[&seed]);
        seed.zeroize();

        let r_point = G::mul_base(&k);
        let r = G::encode_point(&r_point);
        let e = challenge::<G>(&r, &self.public_bytes(), message);
        let s = k + e * self.secret;
        k.zeroize();

        Signature {
            r,
            s: G::encode_scalar(&s),
        }
    }

    /// Verify `signature` over `message` for `public_key`.
    ///
    /// Malformed points or non-canonical scalars simply fail.
    pub fn verify(message: &[u8], signature: &Signature, public_key: &G::Point) -> bool {
        let (Some(r_point), Some(s)) = (
            G::decode_point(&signature.r),
            G::decode_scalar(&signature.s),
        ) else {
            return false;
        };
        let e = challenge::<G>(&signature.r, &G::encode_point(public_key), message);
        G::mul_base(&s) == r_point + *public_key * e
    }

    /// `bc1` + first 40 hex chars of SHA-256(public key)
    pub fn derive_address(&self) -> String {
        hashed_label(ADDRESS_PREFIX, &self.public_bytes())
    }
}

impl<G: Group> Clone for KeyPair<G> {
    fn clone(&self) -> Self {
        Self {
            secret: self.secret,
            public: self.public,
        }
    }
}

impl<G: Group> Drop for KeyPair<G> {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl<G: Group> std::fmt::Debug for KeyPair<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Spend and view key pairs of one wallet
pub struct WalletKeys<G: Group = Ristretto> {
    pub spend: KeyPair<G>,
    pub view: KeyPair<G>,
}

impl<G: Group> WalletKeys<G> {
    /// Fresh random wallet
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            spend: KeyPair::generate(rng),
            view: KeyPair::generate(rng),
        }
    }

    /// Deterministic wallet; spend and view keys are HKDF-separated
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        check_seed(seed)?;
        let mut spend_okm = hkdf_sha256(seed, WALLET_SALT, b"spend");
        let mut view_okm = hkdf_sha256(seed, WALLET_SALT, b"view");
        let wallet = KeyPair::from_seed(&spend_okm).and_then(|spend| {
            KeyPair::from_seed(&view_okm).map(|view| Self { spend, view })
        });
        spend_okm.zeroize();
        view_okm.zeroize();
        wallet
    }

    /// Plain address (receives block rewards)
    pub fn address(&self) -> String {
        self.spend.derive_address()
    }

    /// Public stealth meta-address to hand to senders
    pub fn stealth_address(&self) -> StealthAddress {
        StealthAddress::new(self.view.public_bytes(), self.spend.public_bytes())
    }

    /// Sender label of transactions signed directly with the spend key
    pub fn sender_label(&self) -> String {
        let image = Lsag::<G>::key_image(&self.spend.secret, &self.spend.public);
        hashed_label(KEY_IMAGE_PREFIX, image.as_bytes())
    }
}

impl<G: Group> Clone for WalletKeys<G> {
    fn clone(&self) -> Self {
        Self {
            spend: self.spend.clone(),
            view: self.view.clone(),
        }
    }
}

impl<G: Group> std::fmt::Debug for WalletKeys<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn check_seed(seed: &[u8]) -> Result<()> {
    if seed.is_empty() {
        return Err(Error::InvalidSeed("seed is empty".into()));
    }
    if seed.len() < MIN_SEED_LEN {
        return Err(Error::InvalidSeed(format!(
            "seed must be at least {} bytes, got {}",
            MIN_SEED_LEN,
            seed.len()
        )));
    }
    Ok(())
}

fn challenge<G: Group>(r: &[u8; 32], public: &[u8; 32], message: &[u8]) -> G::Scalar {
    G::hash_to_scalar(CHALLENGE_DOMAIN, &[r, public, message])
}
