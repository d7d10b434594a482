//! ByteChan - Core Library
//!
//! Privacy-preserving transaction layer on a proof-of-work ledger.
//!
//! ## Modules
//!
//! - `crypto`: prime-order group abstraction, Schnorr keys, hashing
//! - `privacy`: Pedersen commitments, Bulletproofs, LSAG ring signatures,
//!   stealth addresses, transaction mixer
//! - `structures`: Transaction and Block with canonical hashing
//! - `consensus`: proof-of-work search, difficulty retargeting, chain state
//!
//! ## Design Philosophy
//!
//! - **Curve-agnostic**: ring signatures, stealth addresses and commitments are
//!   written against the `Group` trait; `Ristretto` is the shipped instance
//! - **Integer consensus**: targets and retargeting never touch floating point
//! - **Snapshot reads**: chain readers work on immutable snapshots while a
//!   single writer appends

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod logging;
pub mod privacy;
pub mod structures;

// Re-exports for convenience
pub use config::{ChainConfig, MixerConfig};

pub use crypto::{
    group::{Group, Ristretto},
    keys::{KeyPair, Signature, WalletKeys},
};

pub use privacy::{
    bulletproof::{AggregateRangeProof, RangeProof},
    mixer::TransactionMixer,
    pedersen::{Commitment, Pedersen},
    ring::{KeyImage, Lsag, RingSignature},
    stealth::{OneTimeOutput, OutputScanner, OwnedOutput, Stealth, StealthAddress},
};

pub use structures::{
    block::Block,
    transaction::{PrivacyLevel, Transaction, TransactionBuilder},
    types::{Amount, Hash256, Timestamp},
};

pub use consensus::{
    chain::{Blockchain, ChainSnapshot},
    pow::{CancelToken, MiningObserver, Target, TracingObserver},
};

/// Protocol constants
pub mod constants {
    /// Atomic units per coin
    pub const COIN: u64 = 1_000_000;

    /// Genesis timestamp: 2024-01-01 00:00:00 UTC, in milliseconds
    pub const GENESIS_TIMESTAMP: u64 = 1_704_067_200_000;

    /// Sender sentinel for block rewards
    pub const NETWORK_SENDER: &str = "NETWORK";

    /// Default block reward
    pub const MINING_REWARD: u64 = 10 * COIN;

    /// Starting proof-of-work difficulty (leading zero nibbles)
    pub const INITIAL_DIFFICULTY: u32 = 4;

    /// Target seconds between blocks
    pub const TARGET_BLOCK_SECS: u64 = 120;

    /// Blocks per retarget window
    pub const RETARGET_INTERVAL: u64 = 10;

    /// Ring sizes per privacy level
    pub const RING_SIZE_LOW: usize = 5;
    pub const RING_SIZE_MEDIUM: usize = 11;
    pub const RING_SIZE_HIGH: usize = 21;
    pub const RING_SIZE_MAXIMUM: usize = 51;
    pub const MIN_RING_SIZE: usize = 2;

    /// Default range proof width
    pub const RANGE_PROOF_BITS: usize = 64;

    /// Minimum seed length for deterministic keys
    pub const MIN_SEED_LEN: usize = 16;

    /// Address prefixes
    pub const ADDRESS_PREFIX: &str = "bc1";
    pub const STEALTH_PREFIX: &str = "st1";
    pub const KEY_IMAGE_PREFIX: &str = "ki1";

    /// Mixer defaults
    pub const MIN_MIX_SIZE: usize = 10;
    pub const MAX_MIX_JITTER_MS: u64 = 300_000;
    pub const DEFAULT_MIX_HOPS: usize = 3;
}

/// Broad error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad amounts, self-transfers, failed proofs
    Validation,
    /// Malformed keys, seeds, signatures
    Crypto,
    /// Ring policy violations
    Policy,
    /// Broken hashes or links in the chain
    Chain,
    /// Mining stopped before a seal was found
    Mining,
    /// Malformed arguments or encodings
    Input,
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Value {value} outside range [{min}, {min} + 2^{bits})")]
    OutOfRange { value: u64, min: u64, bits: usize },

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Insufficient decoys: need {needed}, have {available}")]
    InsufficientDecoys { needed: usize, available: usize },

    #[error("Invalid ring: {0}")]
    InvalidRing(String),

    #[error("Double spend: key image {0} already seen")]
    DoubleSpend(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Mining cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Classify into the core taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::OutOfRange { .. } | Error::DoubleSpend(_) => {
                ErrorKind::Validation
            }
            Error::Crypto(_) | Error::InvalidSeed(_) => ErrorKind::Crypto,
            Error::Policy(_) | Error::InsufficientDecoys { .. } | Error::InvalidRing(_) => {
                ErrorKind::Policy
            }
            Error::Chain(_) => ErrorKind::Chain,
            Error::Cancelled => ErrorKind::Mining,
            Error::Serialization(_) | Error::InvalidInput(_) => ErrorKind::Input,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
