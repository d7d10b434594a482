//! Prime-Order Group Abstraction
//!
//! Ring signatures, stealth addresses and Pedersen commitments only talk to
//! the `Group` trait:
//! - scalar / point arithmetic through the standard operator traits
//! - hash-to-scalar and hash-to-point with explicit domain separation
//! - canonical 32-byte encodings for wire and storage
//!
//! `Ristretto` is the shipped instance (curve25519-dalek's prime-order
//! Ristretto255). Using Ristretto instead of raw Edwards points removes the
//! cofactor clearing the Edwards-based construction needs.

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::Identity,
};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};
use zeroize::Zeroize;

/// A prime-order group suitable for discrete-log based constructions.
///
/// Implementations must make `Point` equality constant-time; signature and
/// ownership checks rely on it.
pub trait Group: Sized + Send + Sync + 'static {
    /// Element of the scalar field
    type Scalar: Copy
        + Eq
        + Debug
        + Send
        + Sync
        + Zeroize
        + Add<Output = Self::Scalar>
        + Sub<Output = Self::Scalar>
        + Mul<Output = Self::Scalar>
        + Neg<Output = Self::Scalar>;

    /// Group element
    type Point: Copy
        + Eq
        + Debug
        + Send
        + Sync
        + Add<Output = Self::Point>
        + Sub<Output = Self::Point>
        + Mul<Self::Scalar, Output = Self::Point>;

    /// Human-readable group name
    const NAME: &'static str;

    /// Fixed generator G
    fn generator() -> Self::Point;

    /// Neutral element
    fn identity() -> Self::Point;

    /// Embed an integer into the scalar field
    fn scalar_from_u64(value: u64) -> Self::Scalar;

    /// Uniformly random scalar
    fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Self::Scalar;

    /// Hs: hash arbitrary data to a scalar
    fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> Self::Scalar;

    /// Hp: hash arbitrary data to a point with unknown discrete log
    fn hash_to_point(domain: &[u8], parts: &[&[u8]]) -> Self::Point;

    /// Canonical point encoding
    fn encode_point(point: &Self::Point) -> [u8; 32];

    /// Decode a point, rejecting invalid encodings
    fn decode_point(bytes: &[u8; 32]) -> Option<Self::Point>;

    /// Canonical scalar encoding
    fn encode_scalar(scalar: &Self::Scalar) -> [u8; 32];

    /// Decode a scalar, rejecting non-canonical encodings
    fn decode_scalar(bytes: &[u8; 32]) -> Option<Self::Scalar>;

    /// s * G
    fn mul_base(scalar: &Self::Scalar) -> Self::Point {
        Self::generator() * *scalar
    }

    /// Check for the neutral element
    fn is_identity(point: &Self::Point) -> bool {
        *point == Self::identity()
    }
}

/// Ristretto255 over Curve25519
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ristretto;

impl Group for Ristretto {
    type Scalar = Scalar;
    type Point = RistrettoPoint;

    const NAME: &'static str = "ristretto255";

    fn generator() -> RistrettoPoint {
        RISTRETTO_BASEPOINT_POINT
    }

    fn identity() -> RistrettoPoint {
        RistrettoPoint::identity()
    }

    fn scalar_from_u64(value: u64) -> Scalar {
        Scalar::from(value)
    }

    fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
        // Full 512-bit input keeps the reduction bias negligible
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        let scalar = Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();
        scalar
    }

    fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> Scalar {
        Scalar::from_bytes_mod_order_wide(&wide_hash(domain, parts))
    }

    fn hash_to_point(domain: &[u8], parts: &[&[u8]]) -> RistrettoPoint {
        RistrettoPoint::from_uniform_bytes(&wide_hash(domain, parts))
    }

    fn encode_point(point: &RistrettoPoint) -> [u8; 32] {
        point.compress().to_bytes()
    }

    fn decode_point(bytes: &[u8; 32]) -> Option<RistrettoPoint> {
        CompressedRistretto(*bytes).decompress()
    }

    fn encode_scalar(scalar: &Scalar) -> [u8; 32] {
        scalar.to_bytes()
    }

    fn decode_scalar(bytes: &[u8; 32]) -> Option<Scalar> {
        Option::from(Scalar::from_canonical_bytes(*bytes))
    }

    fn mul_base(scalar: &Scalar) -> RistrettoPoint {
        RistrettoPoint::mul_base(scalar)
    }
}

/// SHA-512 over length-prefixed domain and parts
fn wide_hash(domain: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}
