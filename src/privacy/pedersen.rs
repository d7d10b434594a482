//! Pedersen Commitments
//!
//! Pedersen commitments hide transaction amounts:
//! - C = v*G + r*H (commitment to value v with blinding factor r)
//! - Perfectly hiding: reveals nothing about v
//! - Computationally binding: can't change v without knowing r
//!
//! `G` is the group generator and `H = hash_to_point("bytechan-pedersen-H")`,
//! so nobody knows log_G(H). The same pair backs the Bulletproof range proofs.

use crate::crypto::group::{Group, Ristretto};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Domain of the blinding generator H
pub const PEDERSEN_H_DOMAIN: &[u8] = b"bytechan-pedersen-H";

/// Encoded commitment point
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "hex::serde")] pub [u8; 32]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", &hex::encode(&self.0[..8]))
    }
}

/// Commitment scheme over `G`
pub struct Pedersen<G: Group = Ristretto>(PhantomData<G>);

impl<G: Group> Pedersen<G> {
    /// Blinding generator H
    pub fn generator_h() -> G::Point {
        G::hash_to_point(PEDERSEN_H_DOMAIN, &[])
    }

    /// Fresh random blinding factor
    pub fn random_blinding<R: RngCore + CryptoRng>(rng: &mut R) -> G::Scalar {
        G::random_scalar(rng)
    }

    /// C = v*G + r*H as a point
    pub fn commit_point(value: u64, blinding: &G::Scalar) -> G::Point {
        G::mul_base(&G::scalar_from_u64(value)) + Self::generator_h() * *blinding
    }

    /// Commit with specific blinding factor
    pub fn commit(value: u64, blinding: &G::Scalar) -> Commitment {
        Commitment(G::encode_point(&Self::commit_point(value, blinding)))
    }

    /// Commit with a random blinding factor, returning both
    pub fn commit_random<R: RngCore + CryptoRng>(value: u64, rng: &mut R) -> (Commitment, G::Scalar) {
        let blinding = Self::random_blinding(rng);
        (Self::commit(value, &blinding), blinding)
    }

    /// Check that `commitment` opens to `value` under `blinding`
    pub fn open(commitment: &Commitment, value: u64, blinding: &G::Scalar) -> bool {
        match G::decode_point(&commitment.0) {
            Some(point) => point == Self::commit_point(value, blinding),
            None => false,
        }
    }

    /// Decode a commitment point
    pub fn decode(commitment: &Commitment) -> Result<G::Point> {
        G::decode_point(&commitment.0).ok_or_else(|| Error::Crypto("Invalid commitment".into()))
    }

    /// C1 + C2 = (v1 + v2)*G + (r1 + r2)*H
    pub fn add(a: &Commitment, b: &Commitment) -> Result<Commitment> {
        let sum = Self::decode(a)? + Self::decode(b)?;
        Ok(Commitment(G::encode_point(&sum)))
    }

    /// C1 - C2 = (v1 - v2)*G + (r1 - r2)*H
    pub fn sub(a: &Commitment, b: &Commitment) -> Result<Commitment> {
        let diff = Self::decode(a)? - Self::decode(b)?;
        Ok(Commitment(G::encode_point(&diff)))
    }

    /// Check `sum(inputs) == sum(outputs) + fee*G`.
    ///
    /// Blinding factors must already cancel; the fee is committed with zero
    /// blinding.
    pub fn verify_balance(inputs: &[Commitment], outputs: &[Commitment], fee: u64) -> Result<bool> {
        if inputs.is_empty() || outputs.is_empty() {
            return Ok(false);
        }

        let mut input_sum = G::identity();
        for c in inputs {
            input_sum = input_sum + Self::decode(c)?;
        }

        let mut output_sum = G::mul_base(&G::scalar_from_u64(fee));
        for c in outputs {
            output_sum = output_sum + Self::decode(c)?;
        }

        Ok(input_sum == output_sum)
    }
}
