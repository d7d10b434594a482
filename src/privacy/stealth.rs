//! Stealth Addresses
//!
//! Stealth addresses provide recipient privacy:
//! - Sender generates unique one-time address for each transaction
//! - Only recipient can detect and spend funds
//! - No reuse of addresses on chain
//!
//! CryptoNote scheme, with A / a the view key and B / b the spend key:
//! - sender:    R = r*G,  P = Hs(r*A)*G + B
//! - recipient: P == Hs(a*R)*G + B, spend with x = Hs(a*R) + b

use crate::constants::STEALTH_PREFIX;
use crate::consensus::chain::ChainSnapshot;
use crate::crypto::group::{Group, Ristretto};
use crate::crypto::hash::hashed_label;
use crate::privacy::pedersen::Commitment;
use crate::structures::types::{Amount, Hash256};
use crate::{Error, Result};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use zeroize::Zeroize;

const DERIVATION_DOMAIN: &[u8] = b"bytechan-stealth";

/// Public address (view key + spend key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StealthAddress {
    /// View public key (for scanning incoming transactions)
    #[serde(with = "hex::serde")]
    pub view_public: [u8; 32],
    /// Spend public key (for spending funds)
    #[serde(with = "hex::serde")]
    pub spend_public: [u8; 32],
}

impl StealthAddress {
    /// Create from keys
    pub fn new(view_public: [u8; 32], spend_public: [u8; 32]) -> Self {
        Self { view_public, spend_public }
    }

    /// Serialize to bytes (64 bytes)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut result = [0u8; 64];
        result[..32].copy_from_slice(&self.view_public);
        result[32..].copy_from_slice(&self.spend_public);
        result
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 64 {
            return None;
        }
        let mut view_public = [0u8; 32];
        let mut spend_public = [0u8; 32];
        view_public.copy_from_slice(&bytes[..32]);
        spend_public.copy_from_slice(&bytes[32..]);
        Some(Self { view_public, spend_public })
    }
}

impl fmt::Debug for StealthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StealthAddress")
            .field("view", &hex::encode(&self.view_public[..8]))
            .field("spend", &hex::encode(&self.spend_public[..8]))
            .finish()
    }
}

/// One-time output key published in a transaction
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OneTimeOutput {
    /// Ephemeral public key R
    #[serde(with = "hex::serde")]
    pub ephemeral_public: [u8; 32],
    /// One-time public key P (destination key)
    #[serde(with = "hex::serde")]
    pub one_time_public: [u8; 32],
}

impl OneTimeOutput {
    /// `st1` + first 40 hex chars of SHA-256(P)
    pub fn label(&self) -> String {
        hashed_label(STEALTH_PREFIX, &self.one_time_public)
    }
}

impl fmt::Debug for OneTimeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneTimeOutput")
            .field("ephemeral", &hex::encode(&self.ephemeral_public[..8]))
            .field("one_time", &hex::encode(&self.one_time_public[..8]))
            .finish()
    }
}

/// Stealth derivations over `G`
pub struct Stealth<G: Group = Ristretto>(PhantomData<G>);

impl<G: Group> Stealth<G> {
    /// Fresh one-time output for `recipient`, plus the shared point r*A
    pub fn derive<R: RngCore + CryptoRng>(
        recipient: &StealthAddress,
        rng: &mut R,
    ) -> Result<(OneTimeOutput, G::Point)> {
        let mut r = G::random_scalar(rng);
        let derived = Self::derive_with_ephemeral(recipient, &r);
        r.zeroize();
        derived
    }

    /// Same as `derive` with a caller-chosen ephemeral secret r
    pub fn derive_with_ephemeral(
        recipient: &StealthAddress,
        r: &G::Scalar,
    ) -> Result<(OneTimeOutput, G::Point)> {
        let a = G::decode_point(&recipient.view_public)
            .ok_or_else(|| Error::Crypto("Invalid view public key".into()))?;
        let b = G::decode_point(&recipient.spend_public)
            .ok_or_else(|| Error::Crypto("Invalid spend public key".into()))?;

        let shared = a * *r;
        let p = G::mul_base(&Self::derivation_scalar(&shared)) + b;

        let output = OneTimeOutput {
            ephemeral_public: G::encode_point(&G::mul_base(r)),
            one_time_public: G::encode_point(&p),
        };
        Ok((output, shared))
    }

    /// Recipient side of the shared point: a*R
    pub fn shared_secret(output: &OneTimeOutput, view_secret: &G::Scalar) -> Option<G::Point> {
        G::decode_point(&output.ephemeral_public).map(|r_point| r_point * *view_secret)
    }

    /// Check whether `output` was addressed to the holder of `view_secret`
    pub fn is_owned(output: &OneTimeOutput, view_secret: &G::Scalar, spend_public: &G::Point) -> bool {
        let Some(shared) = Self::shared_secret(output, view_secret) else {
            return false;
        };
        let expected = G::mul_base(&Self::derivation_scalar(&shared)) + *spend_public;
        match G::decode_point(&output.one_time_public) {
            Some(p) => p == expected,
            None => false,
        }
    }

    /// One-time secret x = Hs(a*R) + b; fails if x*G is not the output key
    pub fn derive_spend_secret(
        output: &OneTimeOutput,
        view_secret: &G::Scalar,
        spend_secret: &G::Scalar,
    ) -> Result<G::Scalar> {
        let shared = Self::shared_secret(output, view_secret)
            .ok_or_else(|| Error::Crypto("Invalid ephemeral key".into()))?;
        let x = Self::derivation_scalar(&shared) + *spend_secret;

        if G::encode_point(&G::mul_base(&x)) != output.one_time_public {
            return Err(Error::Crypto("output is not owned by these keys".into()));
        }
        Ok(x)
    }

    fn derivation_scalar(shared: &G::Point) -> G::Scalar {
        G::hash_to_scalar(DERIVATION_DOMAIN, &[&G::encode_point(shared)])
    }
}

/// An output found by scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedOutput {
    /// Block holding the transaction
    pub block_index: u64,
    pub tx_id: Hash256,
    pub output: OneTimeOutput,
    pub commitment: Commitment,
    /// Amount when it could be recovered and matches the commitment
    pub amount: Option<Amount>,
}

/// Lazy walk over a chain snapshot yielding outputs owned by one view key
pub struct OutputScanner {
    snapshot: Arc<ChainSnapshot>,
    view_secret: Scalar,
    spend_public: RistrettoPoint,
    block: usize,
    tx: usize,
}

impl OutputScanner {
    /// Scan from genesis
    pub fn new(snapshot: Arc<ChainSnapshot>, view_secret: Scalar, spend_public: RistrettoPoint) -> Self {
        Self::resume(snapshot, view_secret, spend_public, 0)
    }

    /// Scan from `from_block` onward
    pub fn resume(
        snapshot: Arc<ChainSnapshot>,
        view_secret: Scalar,
        spend_public: RistrettoPoint,
        from_block: u64,
    ) -> Self {
        Self {
            snapshot,
            view_secret,
            spend_public,
            block: usize::try_from(from_block).unwrap_or(usize::MAX),
            tx: 0,
        }
    }

    /// Index of the next block not yet fully scanned
    pub fn cursor(&self) -> u64 {
        self.block as u64
    }
}

impl Iterator for OutputScanner {
    type Item = OwnedOutput;

    fn next(&mut self) -> Option<OwnedOutput> {
        let blocks = self.snapshot.blocks();
        while let Some(block) = blocks.get(self.block) {
            while let Some(tx) = block.transactions.get(self.tx) {
                self.tx += 1;
                let Some(output) = tx.stealth_output else {
                    continue;
                };
                if !Stealth::<Ristretto>::is_owned(&output, &self.view_secret, &self.spend_public) {
                    continue;
                }
                let amount = Stealth::<Ristretto>::shared_secret(&output, &self.view_secret)
                    .and_then(|shared| tx.reveal_amount(&shared));
                return Some(OwnedOutput {
                    block_index: block.index,
                    tx_id: tx.id,
                    output,
                    commitment: tx.commitment,
                    amount,
                });
            }
            self.block += 1;
            self.tx = 0;
        }
        None
    }
}

impl Drop for OutputScanner {
    fn drop(&mut self) {
        self.view_secret.zeroize();
    }
}

impl fmt::Debug for OutputScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputScanner")
            .field("cursor", &self.block)
            .field("chain_len", &self.snapshot.len())
            .finish_non_exhaustive()
    }
}
