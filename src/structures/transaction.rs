//! Transaction Structure for ByteChan
//!
//! A private transfer carries:
//! - a stealth output for the recipient (one-time key + ephemeral key)
//! - a Pedersen commitment to the amount with a range proof on [1, 1 + 2^64)
//! - an LSAG ring signature whose key image names the sender
//! - for confidential transfers, no plaintext amount but an `AmountNote`
//!   readable with the recipient's (and optionally the sender's) view key
//!
//! Block rewards are public transactions from the `NETWORK` sentinel.
//!
//! The ring signature covers every field except `sender` (derived from the
//! signature itself) and `timestamp`, so the mixer can re-time transactions
//! without invalidating them.

use crate::constants::{NETWORK_SENDER, RANGE_PROOF_BITS, RING_SIZE_HIGH, RING_SIZE_LOW,
    RING_SIZE_MAXIMUM, RING_SIZE_MEDIUM};
use crate::crypto::group::{Group, Ristretto};
use crate::crypto::hash::{canonical_hash, sha256_multi};
use crate::crypto::keys::KeyPair;
use crate::privacy::bulletproof::RangeProof;
use crate::privacy::pedersen::{Commitment, Pedersen};
use crate::privacy::ring::{KeyImage, Lsag, RingSignature};
use crate::privacy::stealth::{OneTimeOutput, Stealth, StealthAddress};
use crate::structures::types::{now_ms, Amount, Hash256, Timestamp};
use crate::{Error, Result};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::debug;
use zeroize::Zeroize;

const BLINDING_DOMAIN: &[u8] = b"commitment-mask";
const AMOUNT_MASK_DOMAIN: &[u8] = b"bytechan-amount-mask";
const SIGNING_DOMAIN: &str = "bytechan-tx-sign";

/// Anonymity set requested by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl PrivacyLevel {
    /// Minimum ring size for this level
    pub fn ring_size(&self) -> usize {
        match self {
            PrivacyLevel::Low => RING_SIZE_LOW,
            PrivacyLevel::Medium => RING_SIZE_MEDIUM,
            PrivacyLevel::High => RING_SIZE_HIGH,
            PrivacyLevel::Maximum => RING_SIZE_MAXIMUM,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Low => "low",
            PrivacyLevel::Medium => "medium",
            PrivacyLevel::High => "high",
            PrivacyLevel::Maximum => "maximum",
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount XOR-masked with a hash of a stealth shared point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedAmount(#[serde(with = "hex::serde")] pub [u8; 8]);

impl MaskedAmount {
    fn seal(amount: Amount, shared: &RistrettoPoint) -> Self {
        let mut bytes = amount.to_le_bytes();
        for (b, m) in bytes.iter_mut().zip(amount_mask(shared)) {
            *b ^= m;
        }
        Self(bytes)
    }

    fn open(&self, shared: &RistrettoPoint) -> Amount {
        let mut bytes = self.0;
        for (b, m) in bytes.iter_mut().zip(amount_mask(shared)) {
            *b ^= m;
        }
        Amount::from_le_bytes(bytes)
    }
}

fn amount_mask(shared: &RistrettoPoint) -> [u8; 8] {
    let digest = sha256_multi(&[AMOUNT_MASK_DOMAIN, &Ristretto::encode_point(shared)]);
    let mut mask = [0u8; 8];
    mask.copy_from_slice(&digest[..8]);
    mask
}

/// Commitment blinding both sides derive from the stealth shared point
fn blinding_for(shared: &RistrettoPoint) -> Scalar {
    Ristretto::hash_to_scalar(BLINDING_DOMAIN, &[&Ristretto::encode_point(shared)])
}

/// Blinding of a transfer commitment: shared-point derived when confidential,
/// zero when the amount is public so anyone can open it
fn transfer_blinding(confidential: bool, shared: &RistrettoPoint) -> Scalar {
    if confidential {
        blinding_for(shared)
    } else {
        Scalar::ZERO
    }
}

/// Encrypted amount of a confidential transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountNote {
    /// Readable by the recipient (key r*A)
    pub recipient: MaskedAmount,
    /// Readable by the sender's view key (key r*V), if one was given
    pub sender: Option<MaskedAmount>,
}

/// Transfer between stealth outputs, or a block reward
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// SHA-256 of the canonical id fields
    pub id: Hash256,

    /// Key-image label of the signer, or `NETWORK`
    pub sender: String,

    /// One-time stealth label, or a plain address for rewards
    pub recipient: String,

    /// Plaintext amount; `None` when confidential
    pub amount: Option<Amount>,

    pub commitment: Commitment,

    pub range_proof: Option<RangeProof>,

    pub ring_signature: Option<RingSignature>,

    pub stealth_output: Option<OneTimeOutput>,

    pub note: Option<AmountNote>,

    /// Creation time (ms)
    pub timestamp: Timestamp,

    pub privacy_level: PrivacyLevel,

    pub confidential: bool,
}

impl Transaction {
    /// Block reward paid by the network to a plain address
    pub fn reward(address: &str, amount: Amount, timestamp: Timestamp) -> Result<Self> {
        if amount == 0 {
            return Err(Error::Validation("reward must be positive".into()));
        }
        let mut tx = Self {
            id: Hash256::ZERO,
            sender: NETWORK_SENDER.to_string(),
            recipient: address.to_string(),
            amount: Some(amount),
            commitment: Pedersen::<Ristretto>::commit(amount, &Scalar::ZERO),
            range_proof: None,
            ring_signature: None,
            stealth_output: None,
            note: None,
            timestamp,
            privacy_level: PrivacyLevel::Low,
            confidential: false,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    /// Reward transactions come from the `NETWORK` sentinel
    pub fn is_reward(&self) -> bool {
        self.sender == NETWORK_SENDER
    }

    /// Key image of the signer
    pub fn key_image(&self) -> Option<&KeyImage> {
        self.ring_signature.as_ref().map(|sig| &sig.key_image)
    }

    /// Hash of `{amount | commitment, privacy_level, recipient, sender, timestamp}`
    pub fn compute_id(&self) -> Result<Hash256> {
        let fields = if self.confidential {
            json!({
                "commitment": self.commitment.to_hex(),
                "privacy_level": self.privacy_level,
                "recipient": self.recipient,
                "sender": self.sender,
                "timestamp": self.timestamp,
            })
        } else {
            json!({
                "amount": self.amount,
                "privacy_level": self.privacy_level,
                "recipient": self.recipient,
                "sender": self.sender,
                "timestamp": self.timestamp,
            })
        };
        Ok(Hash256(canonical_hash(&fields)?))
    }

    /// Bytes covered by the ring signature
    pub fn signing_message(&self) -> Result<Vec<u8>> {
        let fields = json!({
            "domain": SIGNING_DOMAIN,
            "amount": self.amount,
            "commitment": self.commitment,
            "confidential": self.confidential,
            "note": self.note,
            "privacy_level": self.privacy_level,
            "range_proof": self.range_proof,
            "recipient": self.recipient,
            "stealth_output": self.stealth_output,
        });
        Ok(canonical_hash(&fields)?.to_vec())
    }

    /// Copy shifted `delay_ms` later, with its id recomputed
    pub fn with_delay(&self, delay_ms: u64) -> Result<Self> {
        let mut delayed = self.clone();
        delayed.timestamp = self.timestamp.saturating_add(delay_ms);
        delayed.id = delayed.compute_id()?;
        Ok(delayed)
    }

    /// Amount as seen by the recipient holding the shared point a*R.
    ///
    /// Returns `None` unless the recovered amount opens the commitment.
    pub fn reveal_amount(&self, shared: &RistrettoPoint) -> Option<Amount> {
        let candidate = match (self.amount, &self.note) {
            (Some(amount), _) => amount,
            (None, Some(note)) => note.recipient.open(shared),
            (None, None) => return None,
        };
        let blinding = transfer_blinding(self.confidential, shared);
        Pedersen::<Ristretto>::open(&self.commitment, candidate, &blinding).then_some(candidate)
    }

    /// Amount as seen by the sender's view key, for transactions it signed
    pub fn reveal_sent_amount(&self, sender_view_secret: &Scalar) -> Option<Amount> {
        if let Some(amount) = self.amount {
            return Some(amount);
        }
        let masked = self.note.as_ref()?.sender?;
        let output = self.stealth_output.as_ref()?;
        let shared = Stealth::<Ristretto>::shared_secret(output, sender_view_secret)?;
        Some(masked.open(&shared))
    }

    /// `true` iff `validate` succeeds
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Full structural and cryptographic check
    pub fn validate(&self) -> Result<()> {
        if self.id != self.compute_id()? {
            return Err(Error::Validation("transaction id does not match contents".into()));
        }
        if self.sender == self.recipient {
            return Err(Error::Validation("sender and recipient are identical".into()));
        }
        if self.is_reward() {
            return self.validate_reward();
        }

        match (self.confidential, self.amount) {
            (true, Some(_)) => {
                return Err(Error::Validation("confidential transaction exposes its amount".into()))
            }
            (true, None) if self.note.is_none() => {
                return Err(Error::Validation("confidential transaction without amount note".into()))
            }
            (false, None) => return Err(Error::Validation("missing amount".into())),
            (false, Some(0)) => return Err(Error::Validation("amount must be positive".into())),
            _ => {}
        }

        let proof = self
            .range_proof
            .as_ref()
            .ok_or_else(|| Error::Validation("missing range proof".into()))?;
        if proof.min == 0 || !proof.verify(&self.commitment) {
            return Err(Error::Validation("range proof does not verify".into()));
        }
        if let (false, Some(amount)) = (self.confidential, self.amount) {
            if !Pedersen::<Ristretto>::open(&self.commitment, amount, &Scalar::ZERO) {
                return Err(Error::Validation("public amount does not open the commitment".into()));
            }
        }

        let output = self
            .stealth_output
            .as_ref()
            .ok_or_else(|| Error::Validation("missing stealth output".into()))?;
        if self.recipient != output.label() {
            return Err(Error::Validation("recipient does not match stealth output".into()));
        }

        let signature = self
            .ring_signature
            .as_ref()
            .ok_or_else(|| Error::Validation("missing ring signature".into()))?;
        let required = self.privacy_level.ring_size();
        if signature.ring_size() < required {
            return Err(Error::Policy(format!(
                "{} privacy needs a ring of {}, got {}",
                self.privacy_level,
                required,
                signature.ring_size()
            )));
        }
        Lsag::<Ristretto>::check_structure(signature)?;
        if !Lsag::<Ristretto>::verify(&self.signing_message()?, signature) {
            return Err(Error::Validation("ring signature does not verify".into()));
        }
        if self.sender != signature.key_image.label() {
            return Err(Error::Validation("sender does not match key image".into()));
        }

        Ok(())
    }

    fn validate_reward(&self) -> Result<()> {
        let amount = match self.amount {
            Some(amount) if amount > 0 => amount,
            _ => return Err(Error::Validation("reward must carry a positive amount".into())),
        };
        if self.confidential || self.note.is_some() {
            return Err(Error::Validation("reward must be public".into()));
        }
        if self.ring_signature.is_some() || self.stealth_output.is_some() || self.range_proof.is_some() {
            return Err(Error::Validation("reward carries private-transfer fields".into()));
        }
        if !Pedersen::<Ristretto>::open(&self.commitment, amount, &Scalar::ZERO) {
            return Err(Error::Validation("reward commitment does not match amount".into()));
        }
        Ok(())
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("amount", &self.amount)
            .field("privacy_level", &self.privacy_level)
            .field("confidential", &self.confidential)
            .finish()
    }
}

/// Builds and signs private transfers
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    signer: KeyPair,
    recipient: StealthAddress,
    amount: Amount,
    privacy: PrivacyLevel,
    confidential: bool,
    decoys: Vec<[u8; 32]>,
    sender_view: Option<[u8; 32]>,
    timestamp: Option<Timestamp>,
}

impl TransactionBuilder {
    /// Start a transfer of `amount` from `signer` to `recipient`
    pub fn new(signer: &KeyPair, recipient: StealthAddress, amount: Amount) -> Self {
        Self {
            signer: signer.clone(),
            recipient,
            amount,
            privacy: PrivacyLevel::default(),
            confidential: false,
            decoys: Vec::new(),
            sender_view: None,
            timestamp: None,
        }
    }

    /// Set privacy level (ring size)
    pub fn privacy(mut self, level: PrivacyLevel) -> Self {
        self.privacy = level;
        self
    }

    /// Hide the plaintext amount
    pub fn confidential(mut self, confidential: bool) -> Self {
        self.confidential = confidential;
        self
    }

    /// Candidate decoy public keys for the ring
    pub fn decoys(mut self, decoys: &[[u8; 32]]) -> Self {
        self.decoys = decoys.to_vec();
        self
    }

    /// Let this view public key read the amount note too
    pub fn sender_view_key(mut self, view_public: [u8; 32]) -> Self {
        self.sender_view = Some(view_public);
        self
    }

    /// Fix the timestamp instead of reading the clock
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Replace the signing key
    pub fn signer(mut self, signer: &KeyPair) -> Self {
        self.signer = signer.clone();
        self
    }

    /// Replace the recipient
    pub fn recipient(mut self, recipient: StealthAddress) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn recipient_address(&self) -> &StealthAddress {
        &self.recipient
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn decoy_set(&self) -> &[[u8; 32]] {
        &self.decoys
    }

    /// Derive the stealth output, commit, prove and ring-sign
    pub fn build<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Transaction> {
        if self.amount == 0 {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let signer_public = self.signer.public_bytes();
        if self.recipient.spend_public == signer_public {
            return Err(Error::Validation("cannot send to own spend key".into()));
        }

        let mut r = Ristretto::random_scalar(rng);
        let derived = Stealth::<Ristretto>::derive_with_ephemeral(&self.recipient, &r);
        let sender_shared = self.sender_view.map(|view| {
            Ristretto::decode_point(&view)
                .map(|point| point * r)
                .ok_or_else(|| Error::Crypto("Invalid sender view key".into()))
        });
        r.zeroize();
        let (output, shared) = derived?;
        let sender_shared = sender_shared.transpose()?;

        let mut blinding = transfer_blinding(self.confidential, &shared);
        let proof = RangeProof::generate_with_min(self.amount, &blinding, 1, RANGE_PROOF_BITS);
        blinding.zeroize();
        let proof = proof?;

        let note = self.confidential.then(|| AmountNote {
            recipient: MaskedAmount::seal(self.amount, &shared),
            sender: sender_shared.map(|s| MaskedAmount::seal(self.amount, &s)),
        });

        let mut tx = Transaction {
            id: Hash256::ZERO,
            sender: String::new(),
            recipient: output.label(),
            amount: (!self.confidential).then_some(self.amount),
            commitment: proof.commitment,
            range_proof: Some(proof),
            ring_signature: None,
            stealth_output: Some(output),
            note,
            timestamp: self.timestamp.unwrap_or_else(now_ms),
            privacy_level: self.privacy,
            confidential: self.confidential,
        };

        let ring = Lsag::<Ristretto>::generate_ring(
            &signer_public,
            &self.decoys,
            self.privacy.ring_size(),
            rng,
        )?;
        let signature = Lsag::<Ristretto>::sign(&tx.signing_message()?, self.signer.secret(), &ring, rng)?;

        tx.sender = signature.key_image.label();
        tx.ring_signature = Some(signature);
        tx.id = tx.compute_id()?;

        debug!(
            id = %tx.id,
            privacy = %tx.privacy_level,
            confidential = tx.confidential,
            "transaction built"
        );
        Ok(tx)
    }
}
