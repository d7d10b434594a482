//! Block Structure for ByteChan
//!
//! The block hash is SHA-256 over the canonical JSON encoding
//!
//! `{"index":N,"nonce":K,"previous_hash":"..","timestamp":T,"transactions":[..]}`
//!
//! with sorted keys, integer millisecond timestamps and each transaction in
//! its public serialized form. Only the nonce changes while mining, so the
//! encoding is kept as a prefix / suffix pair around it.

use crate::consensus::pow::{CancelToken, MiningObserver, NonceSearch};
use crate::crypto::hash::{canonical_json, sha256_multi};
use crate::structures::transaction::Transaction;
use crate::structures::types::{Hash256, Height, Timestamp};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical encoding split around the nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashTemplate {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl HashTemplate {
    /// Everything before the nonce digits
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Everything after the nonce digits
    pub fn suffix(&self) -> &[u8] {
        &self.suffix
    }

    /// Block hash for `nonce`
    pub fn hash(&self, nonce: u64) -> Hash256 {
        let digits = nonce.to_string();
        Hash256(sha256_multi(&[self.prefix.as_slice(), digits.as_bytes(), self.suffix.as_slice()]))
    }
}

/// Block of transactions linked to its predecessor by hash
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (genesis = 0)
    pub index: Height,

    /// Creation time (ms)
    pub timestamp: Timestamp,

    pub transactions: Vec<Transaction>,

    pub previous_hash: Hash256,

    pub nonce: u64,

    /// Hash of all other fields
    pub hash: Hash256,
}

impl Block {
    /// Unsealed block (nonce 0, hash computed for that nonce)
    pub fn new(
        index: Height,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
        previous_hash: Hash256,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: Hash256::ZERO,
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Create genesis block
    pub fn genesis(genesis_timestamp: Timestamp) -> Result<Self> {
        Self::new(0, genesis_timestamp, Vec::new(), Hash256::ZERO)
    }

    /// Split canonical encoding for the nonce search
    pub fn hash_template(&self) -> Result<HashTemplate> {
        let mut suffix = format!(
            ",\"previous_hash\":\"{}\",\"timestamp\":{},\"transactions\":[",
            self.previous_hash.to_hex(),
            self.timestamp
        )
        .into_bytes();
        for (i, tx) in self.transactions.iter().enumerate() {
            if i > 0 {
                suffix.push(b',');
            }
            suffix.extend_from_slice(&canonical_json(tx)?);
        }
        suffix.extend_from_slice(b"]}");

        Ok(HashTemplate {
            prefix: format!("{{\"index\":{},\"nonce\":", self.index).into_bytes(),
            suffix,
        })
    }

    /// Recompute the hash from the other fields
    pub fn calculate_hash(&self) -> Result<Hash256> {
        Ok(self.hash_template()?.hash(self.nonce))
    }

    /// Stored hash matches the contents
    pub fn has_valid_hash(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.hash)
    }

    /// Record a found nonce and its hash
    pub fn seal(&mut self, nonce: u64, hash: Hash256) {
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Search a nonce whose hash meets `difficulty`, splitting the nonce
    /// space over `workers` threads
    pub fn mine(
        &mut self,
        difficulty: u32,
        workers: usize,
        cancel: &CancelToken,
        observer: &dyn MiningObserver,
    ) -> Result<()> {
        let search = NonceSearch::new(difficulty, cancel, observer)?.workers(workers);
        let (nonce, hash) = search.run(self.index, &self.hash_template()?)?;
        self.seal(nonce, hash);
        Ok(())
    }

    /// Block reward transaction, if any
    pub fn reward(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.is_reward())
    }

    /// Get total transaction count
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
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

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("index", &self.index)
            .field("hash", &self.hash)
            .field("previous_hash", &self.previous_hash)
            .field("nonce", &self.nonce)
            .field("txs", &self.transactions.len())
            .finish()
    }
}
