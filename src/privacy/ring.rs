//! LSAG Ring Signatures
//!
//! Linkable Spontaneous Anonymous Group signatures allow:
//! - Spending funds without revealing which ring member signed
//! - Preventing double-spends via key images (linkability)
//! - Verification without knowing the real signer
//!
//! Every challenge in the chain binds the message, the full ring and the key
//! image, so none of them can be swapped after signing.

use crate::constants::{KEY_IMAGE_PREFIX, MIN_RING_SIZE};
use crate::crypto::group::{Group, Ristretto};
use crate::crypto::hash::{hashed_label, sha256_multi};
use crate::structures::types::hex_list;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use zeroize::Zeroize;

const HP_DOMAIN: &[u8] = b"bytechan-lsag-Hp";
const CHALLENGE_DOMAIN: &[u8] = b"bytechan-lsag-challenge";

/// Key image for double-spend prevention: I = x * Hp(P)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyImage(#[serde(with = "hex::serde")] pub [u8; 32]);

impl KeyImage {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Public sender label derived from the key image
    pub fn label(&self) -> String {
        hashed_label(KEY_IMAGE_PREFIX, &self.0)
    }
}

impl fmt::Debug for KeyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyImage({})", &hex::encode(&self.0[..8]))
    }
}

/// Ring signature (LSAG)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingSignature {
    /// Key image of the real signer
    pub key_image: KeyImage,

    /// Ring members in signing order
    #[serde(with = "hex_list")]
    pub ring: Vec<[u8; 32]>,

    /// Challenge at position 0
    #[serde(with = "hex::serde")]
    pub c0: [u8; 32],

    /// One response per ring member
    #[serde(with = "hex_list")]
    pub responses: Vec<[u8; 32]>,
}

impl RingSignature {
    pub fn ring_size(&self) -> usize {
        self.ring.len()
    }

    /// `key_image || c0 || ring || responses`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.ring.len() * 64);
        buf.extend_from_slice(&self.key_image.0);
        buf.extend_from_slice(&self.c0);
        for member in &self.ring {
            buf.extend_from_slice(member);
        }
        for s_i in &self.responses {
            buf.extend_from_slice(s_i);
        }
        buf
    }

    /// Inverse of `to_bytes`
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 64 || (bytes.len() - 64) % 64 != 0 {
            return None;
        }
        let n = (bytes.len() - 64) / 64;

        let read = |offset: usize| {
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes[offset..offset + 32]);
            out
        };

        Some(Self {
            key_image: KeyImage(read(0)),
            c0: read(32),
            ring: (0..n).map(|i| read(64 + i * 32)).collect(),
            responses: (0..n).map(|i| read(64 + (n + i) * 32)).collect(),
        })
    }
}

impl fmt::Debug for RingSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingSignature")
            .field("key_image", &self.key_image)
            .field("ring_size", &self.ring.len())
            .finish()
    }
}

/// LSAG over `G`
pub struct Lsag<G: Group = Ristretto>(PhantomData<G>);

impl<G: Group> Lsag<G> {
    /// Compute key image from private key: I = x * Hp(P)
    pub fn key_image(secret: &G::Scalar, public: &G::Point) -> KeyImage {
        let hp = hash_to_point::<G>(&G::encode_point(public));
        KeyImage(G::encode_point(&(hp * *secret)))
    }

    /// Build a shuffled ring of `ring_size` members containing `signer`.
    ///
    /// Decoys are deduplicated and the signer is never counted as its own
    /// decoy.
    pub fn generate_ring<R: RngCore + CryptoRng>(
        signer: &[u8; 32],
        decoys: &[[u8; 32]],
        ring_size: usize,
        rng: &mut R,
    ) -> Result<Vec<[u8; 32]>> {
        if ring_size < MIN_RING_SIZE {
            return Err(Error::Policy(format!(
                "ring size must be at least {}, got {}",
                MIN_RING_SIZE, ring_size
            )));
        }

        let mut seen = HashSet::new();
        seen.insert(*signer);
        let candidates: Vec<[u8; 32]> = decoys.iter().filter(|d| seen.insert(**d)).copied().collect();

        let needed = ring_size - 1;
        if candidates.len() < needed {
            return Err(Error::InsufficientDecoys {
                needed,
                available: candidates.len(),
            });
        }

        let mut ring: Vec<[u8; 32]> = candidates.choose_multiple(rng, needed).copied().collect();
        ring.push(*signer);
        ring.shuffle(rng);
        Ok(ring)
    }

    /// Sign `message` with `secret`, whose public key must be in `ring`
    pub fn sign<R: RngCore + CryptoRng>(
        message: &[u8],
        secret: &G::Scalar,
        ring: &[[u8; 32]],
        rng: &mut R,
    ) -> Result<RingSignature> {
        let n = ring.len();
        if n < MIN_RING_SIZE {
            return Err(Error::Policy(format!(
                "ring size must be at least {}, got {}",
                MIN_RING_SIZE, n
            )));
        }
        check_distinct(ring)?;

        let public = G::mul_base(secret);
        let public_bytes = G::encode_point(&public);
        let secret_index = ring
            .iter()
            .position(|member| *member == public_bytes)
            .ok_or_else(|| Error::InvalidRing("signer is not a ring member".into()))?;

        let points = decode_ring::<G>(ring)?;
        let hps: Vec<G::Point> = ring.iter().map(|m| hash_to_point::<G>(m)).collect();

        let key_image = Self::key_image(secret, &public);
        let image_point = G::decode_point(&key_image.0)
            .ok_or_else(|| Error::Crypto("Failed to decode key image".into()))?;
        let ring_digest = digest_ring(ring);

        let mut alpha = G::random_scalar(rng);
        let l_real = G::mul_base(&alpha);
        let r_real = hps[secret_index] * alpha;

        let zero = G::scalar_from_u64(0);
        let mut c = vec![zero; n];
        let mut s: Vec<G::Scalar> = (0..n).map(|_| G::random_scalar(rng)).collect();

        // Start at secret_index + 1
        let mut idx = (secret_index + 1) % n;
        c[idx] = challenge::<G>(message, &ring_digest, &key_image, &l_real, &r_real);

        while idx != secret_index {
            // L_i = s_i * G + c_i * P_i
            let l_i = G::mul_base(&s[idx]) + points[idx] * c[idx];
            // R_i = s_i * Hp(P_i) + c_i * I
            let r_i = hps[idx] * s[idx] + image_point * c[idx];

            let next = (idx + 1) % n;
            c[next] = challenge::<G>(message, &ring_digest, &key_image, &l_i, &r_i);
            idx = next;
        }

        // Close the ring: s_real = alpha - c_real * x
        s[secret_index] = alpha - c[secret_index] * *secret;
        alpha.zeroize();

        Ok(RingSignature {
            key_image,
            ring: ring.to_vec(),
            c0: G::encode_scalar(&c[0]),
            responses: s.iter().map(G::encode_scalar).collect(),
        })
    }

    /// Verify a ring signature; any structural defect fails closed
    pub fn verify(message: &[u8], signature: &RingSignature) -> bool {
        if Self::check_structure(signature).is_err() {
            return false;
        }

        let Ok(points) = decode_ring::<G>(&signature.ring) else {
            return false;
        };
        let Some(image_point) = G::decode_point(&signature.key_image.0) else {
            return false;
        };
        let Some(c0) = G::decode_scalar(&signature.c0) else {
            return false;
        };
        let mut responses = Vec::with_capacity(signature.responses.len());
        for bytes in &signature.responses {
            match G::decode_scalar(bytes) {
                Some(s) => responses.push(s),
                None => return false,
            }
        }

        let ring_digest = digest_ring(&signature.ring);
        let mut c_current = c0;
        for (i, member) in signature.ring.iter().enumerate() {
            let l_i = G::mul_base(&responses[i]) + points[i] * c_current;
            let r_i = hash_to_point::<G>(member) * responses[i] + image_point * c_current;
            c_current = challenge::<G>(message, &ring_digest, &signature.key_image, &l_i, &r_i);
        }

        c_current == c0
    }

    /// Shape checks that need no curve arithmetic beyond decoding the key image
    pub fn check_structure(signature: &RingSignature) -> Result<()> {
        let n = signature.ring.len();
        if n < MIN_RING_SIZE {
            return Err(Error::Policy(format!(
                "ring size must be at least {}, got {}",
                MIN_RING_SIZE, n
            )));
        }
        if signature.responses.len() != n {
            return Err(Error::InvalidRing(format!(
                "{} responses for {} ring members",
                signature.responses.len(),
                n
            )));
        }
        check_distinct(&signature.ring)?;

        match G::decode_point(&signature.key_image.0) {
            Some(point) if !G::is_identity(&point) => Ok(()),
            _ => Err(Error::InvalidRing("invalid key image".into())),
        }
    }

    /// Two signatures by the same key share a key image
    pub fn linked(a: &RingSignature, b: &RingSignature) -> bool {
        a.key_image == b.key_image
    }
}

/// Hp: hash a public key to a point
fn hash_to_point<G: Group>(public: &[u8; 32]) -> G::Point {
    G::hash_to_point(HP_DOMAIN, &[public])
}

fn digest_ring(ring: &[[u8; 32]]) -> [u8; 32] {
    let parts: Vec<&[u8]> = ring.iter().map(|m| m.as_slice()).collect();
    sha256_multi(&parts)
}

fn challenge<G: Group>(
    message: &[u8],
    ring_digest: &[u8; 32],
    key_image: &KeyImage,
    l: &G::Point,
    r: &G::Point,
) -> G::Scalar {
    G::hash_to_scalar(
        CHALLENGE_DOMAIN,
        &[
            message,
            ring_digest,
            &key_image.0,
            &G::encode_point(l),
            &G::encode_point(r),
        ],
    )
}

fn check_distinct(ring: &[[u8; 32]]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ring.len());
    if ring.iter().all(|member| seen.insert(*member)) {
        Ok(())
    } else {
        Err(Error::InvalidRing("duplicate ring member".into()))
    }
}

fn decode_ring<G: Group>(ring: &[[u8; 32]]) -> Result<Vec<G::Point>> {
    ring.iter()
        .map(|bytes| {
            G::decode_point(bytes).ok_or_else(|| Error::InvalidRing("invalid public key in ring".into()))
        })
        .collect()
}
