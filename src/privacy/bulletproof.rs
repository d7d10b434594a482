//! Bulletproof Range Proofs
//!
//! Proves a committed value lies in `[min, min + 2^n)` without revealing it,
//! with `n ∈ {8, 16, 32, 64}`. Proof size is logarithmic in `n`, and an
//! aggregated proof over `m` values is logarithmic in `n·m`.
//!
//! Proving runs on the `bulletproofs` crate, which is built on
//! curve25519-dalek-ng. Both crates use the same Ristretto encoding, so
//! points and scalars cross over as their canonical bytes. The generators
//! are the same pair Pedersen commitments use (value on G, blinding on H).

use crate::crypto::group::{Group, Ristretto};
use crate::privacy::pedersen::{Commitment, Pedersen};
use crate::{Error, Result};
use bulletproofs::{BulletproofGens, PedersenGens, RangeProof as BpRangeProof};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek_ng::{
    constants::RISTRETTO_BASEPOINT_POINT as NG_BASEPOINT,
    ristretto::CompressedRistretto as NgCompressed,
    scalar::Scalar as NgScalar,
};
use merlin::Transcript;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed proof widths
pub const SUPPORTED_BITS: [usize; 4] = [8, 16, 32, 64];

/// Most values a single aggregated proof can cover
pub const MAX_AGGREGATION: usize = 16;

lazy_static::lazy_static! {
    static ref PC_GENS: Option<PedersenGens> = pedersen_gens();
    static ref BP_GENS: BulletproofGens = BulletproofGens::new(64, MAX_AGGREGATION);
}

/// Commitment generators in dalek-ng form
fn pedersen_gens() -> Option<PedersenGens> {
    let h = Ristretto::encode_point(&Pedersen::<Ristretto>::generator_h());
    let blinding_base = NgCompressed(h).decompress()?;
    Some(PedersenGens {
        B: NG_BASEPOINT,
        B_blinding: blinding_base,
    })
}

fn gens() -> Result<&'static PedersenGens> {
    PC_GENS
        .as_ref()
        .ok_or_else(|| Error::Crypto("Pedersen generator H does not decode".into()))
}

fn to_ng_scalar(scalar: &Scalar) -> NgScalar {
    NgScalar::from_bytes_mod_order(scalar.to_bytes())
}

fn check_bits(bit_length: usize) -> Result<()> {
    if SUPPORTED_BITS.contains(&bit_length) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "bit length must be one of {:?}, got {}",
            SUPPORTED_BITS, bit_length
        )))
    }
}

fn check_range(value: u64, min: u64, bit_length: usize) -> Result<()> {
    let out_of_range = Error::OutOfRange {
        value,
        min,
        bits: bit_length,
    };
    if value < min {
        return Err(out_of_range);
    }
    if u128::from(value - min) >= 1u128 << bit_length {
        return Err(out_of_range);
    }
    Ok(())
}

fn single_transcript(min: u64, bit_length: usize) -> Transcript {
    let mut transcript = Transcript::new(b"bytechan-range-proof");
    transcript.append_u64(b"min", min);
    transcript.append_u64(b"bits", bit_length as u64);
    transcript
}

fn aggregate_transcript(count: usize, bit_length: usize) -> Transcript {
    let mut transcript = Transcript::new(b"bytechan-aggregate-range-proof");
    transcript.append_u64(b"count", count as u64);
    transcript.append_u64(b"bits", bit_length as u64);
    transcript
}

/// Range proof for one commitment
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    /// Commitment the proof speaks about
    pub commitment: Commitment,
    /// Serialized Bulletproof
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Lower bound of the proven range
    pub min: u64,
    /// Width n of the proven range
    pub bit_length: usize,
}

impl RangeProof {
    /// Prove `value ∈ [0, 2^bit_length)` for `commit(value, blinding)`
    pub fn generate(value: u64, blinding: &Scalar, bit_length: usize) -> Result<Self> {
        Self::generate_with_min(value, blinding, 0, bit_length)
    }

    /// Prove `value ∈ [min, min + 2^bit_length)` for `commit(value, blinding)`.
    ///
    /// The proof covers `C - min*G`, a commitment to `value - min` under the
    /// same blinding.
    pub fn generate_with_min(value: u64, blinding: &Scalar, min: u64, bit_length: usize) -> Result<Self> {
        check_bits(bit_length)?;
        check_range(value, min, bit_length)?;

        let commitment = Pedersen::<Ristretto>::commit(value, blinding);
        let mut transcript = single_transcript(min, bit_length);
        let (proof, _) = BpRangeProof::prove_single(
            &BP_GENS,
            gens()?,
            &mut transcript,
            value - min,
            &to_ng_scalar(blinding),
            bit_length,
        )
        .map_err(|e| Error::Crypto(format!("range proof generation failed: {}", e)))?;

        Ok(Self {
            commitment,
            proof: proof.to_bytes(),
            min,
            bit_length,
        })
    }

    /// Verify against `commitment`; needs neither value nor blinding
    pub fn verify(&self, commitment: &Commitment) -> bool {
        if self.commitment != *commitment || check_bits(self.bit_length).is_err() {
            return false;
        }
        let Some(point) = Ristretto::decode_point(&commitment.0) else {
            return false;
        };
        let shifted = point - Ristretto::mul_base(&Ristretto::scalar_from_u64(self.min));
        let shifted = NgCompressed(Ristretto::encode_point(&shifted));

        let Ok(proof) = BpRangeProof::from_bytes(&self.proof) else {
            return false;
        };
        let Ok(pc_gens) = gens() else {
            return false;
        };

        let mut transcript = single_transcript(self.min, self.bit_length);
        proof
            .verify_single(&BP_GENS, pc_gens, &mut transcript, &shifted, self.bit_length)
            .is_ok()
    }

    /// Size of the serialized proof
    pub fn size(&self) -> usize {
        self.proof.len()
    }
}

impl fmt::Debug for RangeProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeProof")
            .field("commitment", &self.commitment)
            .field("min", &self.min)
            .field("bit_length", &self.bit_length)
            .field("size", &self.proof.len())
            .finish()
    }
}

/// One proof covering several commitments
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRangeProof {
    /// Commitments in proving order (without padding)
    pub commitments: Vec<Commitment>,
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    pub bit_length: usize,
}

impl AggregateRangeProof {
    /// Jointly prove every `(value, blinding)` opening lies in `[0, 2^bit_length)`.
    ///
    /// The count is padded to a power of two with zero-value, zero-blinding
    /// commitments, which the verifier rebuilds on its own.
    pub fn aggregate(openings: &[(u64, Scalar)], bit_length: usize) -> Result<Self> {
        check_bits(bit_length)?;
        if openings.is_empty() {
            return Err(Error::InvalidInput("nothing to aggregate".into()));
        }
        if openings.len() > MAX_AGGREGATION {
            return Err(Error::InvalidInput(format!(
                "at most {} values per aggregated proof, got {}",
                MAX_AGGREGATION,
                openings.len()
            )));
        }
        for (value, _) in openings {
            check_range(*value, 0, bit_length)?;
        }

        let padded = openings.len().next_power_of_two();
        let mut values: Vec<u64> = openings.iter().map(|(v, _)| *v).collect();
        let mut blindings: Vec<NgScalar> = openings.iter().map(|(_, r)| to_ng_scalar(r)).collect();
        values.resize(padded, 0);
        blindings.resize(padded, NgScalar::zero());

        let mut transcript = aggregate_transcript(openings.len(), bit_length);
        let (proof, _) = BpRangeProof::prove_multiple(
            &BP_GENS,
            gens()?,
            &mut transcript,
            &values,
            &blindings,
            bit_length,
        )
        .map_err(|e| Error::Crypto(format!("aggregate proof generation failed: {}", e)))?;

        let commitments = openings
            .iter()
            .map(|(v, r)| Pedersen::<Ristretto>::commit(*v, r))
            .collect();

        Ok(Self {
            commitments,
            proof: proof.to_bytes(),
            bit_length,
        })
    }

    /// Succeeds only if every commitment is in range; no per-value result
    pub fn verify(&self, commitments: &[Commitment]) -> bool {
        if commitments.is_empty()
            || commitments != self.commitments.as_slice()
            || check_bits(self.bit_length).is_err()
        {
            return false;
        }

        let padding = Pedersen::<Ristretto>::commit(0, &Scalar::ZERO);
        let mut compressed: Vec<NgCompressed> =
            commitments.iter().map(|c| NgCompressed(c.0)).collect();
        compressed.resize(commitments.len().next_power_of_two(), NgCompressed(padding.0));

        let Ok(proof) = BpRangeProof::from_bytes(&self.proof) else {
            return false;
        };
        let Ok(pc_gens) = gens() else {
            return false;
        };

        let mut transcript = aggregate_transcript(commitments.len(), self.bit_length);
        proof
            .verify_multiple(&BP_GENS, pc_gens, &mut transcript, &compressed, self.bit_length)
            .is_ok()
    }

    /// Size of the serialized proof
    pub fn size(&self) -> usize {
        self.proof.len()
    }
}

impl fmt::Debug for AggregateRangeProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRangeProof")
            .field("count", &self.commitments.len())
            .field("bit_length", &self.bit_length)
            .field("size", &self.proof.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn blinding() -> Scalar {
        Pedersen::<Ristretto>::random_blinding(&mut OsRng)
    }

    #[test]
    fn test_range_proof_verifies() {
        let r = blinding();
        let proof = RangeProof::generate(1_000, &r, 64).unwrap();
        let commitment = Pedersen::<Ristretto>::commit(1_000, &r);

        assert_eq!(proof.commitment, commitment);
        assert!(proof.verify(&commitment));
    }

    #[test]
    fn test_wrong_commitment_rejected() {
        let r = blinding();
        let proof = RangeProof::generate(42, &r, 32).unwrap();
        let other = Pedersen::<Ristretto>::commit(43, &r);
        assert!(!proof.verify(&other));
    }

    #[test]
    fn test_out_of_range_fails_early() {
        let err = RangeProof::generate(256, &blinding(), 8).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { value: 256, min: 0, bits: 8 }));

        let err = RangeProof::generate_with_min(0, &blinding(), 1, 64).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { value: 0, min: 1, .. }));
    }

    #[test]
    fn test_unsupported_bit_length() {
        assert!(matches!(
            RangeProof::generate(1, &blinding(), 12),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_min_shift() {
        let r = blinding();
        let proof = RangeProof::generate_with_min(1, &r, 1, 64).unwrap();
        assert!(proof.verify(&Pedersen::<Ristretto>::commit(1, &r)));

        // Same proof bytes under a different claimed minimum must not verify
        let mut forged = proof.clone();
        forged.min = 0;
        assert!(!forged.verify(&proof.commitment));
    }

    #[test]
    fn test_tampered_proof_rejected() {
        let r = blinding();
        let mut proof = RangeProof::generate(7, &r, 16).unwrap();
        proof.proof[10] ^= 0x01;
        assert!(!proof.verify(&Pedersen::<Ristretto>::commit(7, &r)));
    }

    #[test]
    fn test_aggregate_verifies_with_padding() {
        let openings: Vec<(u64, Scalar)> = (1..=3).map(|v| (v * 100, blinding())).collect();
        let proof = AggregateRangeProof::aggregate(&openings, 32).unwrap();

        let commitments: Vec<Commitment> = openings
            .iter()
            .map(|(v, r)| Pedersen::<Ristretto>::commit(*v, r))
            .collect();
        assert!(proof.verify(&commitments));
        assert!(!proof.verify(&commitments[..2]));
    }

    #[test]
    fn test_aggregate_is_smaller_than_singles() {
        let openings: Vec<(u64, Scalar)> = (0..4).map(|v| (v, blinding())).collect();
        let aggregate = AggregateRangeProof::aggregate(&openings, 64).unwrap();
        let single = RangeProof::generate(0, &openings[0].1, 64).unwrap();
        assert!(aggregate.size() < 4 * single.size());
    }

    #[test]
    fn test_aggregate_rejects_out_of_range_member() {
        let openings = vec![(1u64, blinding()), (300u64, blinding())];
        assert!(matches!(
            AggregateRangeProof::aggregate(&openings, 8),
            Err(Error::OutOfRange { value: 300, .. })
        ));
    }
}
