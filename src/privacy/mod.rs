//! Privacy Module for ByteChan
//!
//! Implements Monero-style privacy features:
//! - Pedersen Commitments (hiding amounts)
//! - Bulletproofs (compact range proofs, single and aggregated)
//! - LSAG Ring Signatures (Linkable Spontaneous Anonymous Group)
//! - Stealth Addresses (one-time keys for each transaction)
//! - Transaction mixing (batch shuffle + jitter, relay chains)

pub mod bulletproof;
pub mod mixer;
pub mod pedersen;
pub mod ring;
pub mod stealth;

pub use bulletproof::{AggregateRangeProof, RangeProof};
pub use mixer::TransactionMixer;
pub use pedersen::{Commitment, Pedersen};
pub use ring::{KeyImage, Lsag, RingSignature};
pub use stealth::{OneTimeOutput, OutputScanner, OwnedOutput, Stealth, StealthAddress};
