//! Runtime configuration
//!
//! Defaults mirror `crate::constants`; every field can be overridden from a
//! JSON document supplied by the embedding service.

use crate::constants::{
    GENESIS_TIMESTAMP, INITIAL_DIFFICULTY, MAX_MIX_JITTER_MS, MINING_REWARD, MIN_MIX_SIZE,
    RETARGET_INTERVAL, TARGET_BLOCK_SECS,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Chain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Difficulty of the first mined block (leading zero nibbles)
    pub initial_difficulty: u32,

    /// Reward paid to the miner of each block
    pub mining_reward: u64,

    /// Target seconds between blocks
    pub target_block_secs: u64,

    /// Retarget every N blocks
    pub retarget_interval: u64,

    /// Genesis timestamp (ms)
    pub genesis_timestamp: u64,

    /// Nonce search threads
    pub mining_workers: usize,

    /// Observer progress callback period, in nonces per worker
    pub progress_interval: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: INITIAL_DIFFICULTY,
            mining_reward: MINING_REWARD,
            target_block_secs: TARGET_BLOCK_SECS,
            retarget_interval: RETARGET_INTERVAL,
            genesis_timestamp: GENESIS_TIMESTAMP,
            mining_workers: default_workers(),
            progress_interval: 10_000,
        }
    }
}

impl ChainConfig {
    /// Parse from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the chain cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.initial_difficulty == 0 || self.initial_difficulty > 64 {
            return Err(Error::InvalidInput(format!(
                "initial_difficulty must be in 1..=64, got {}",
                self.initial_difficulty
            )));
        }
        if self.retarget_interval < 2 {
            return Err(Error::InvalidInput(format!(
                "retarget_interval must be at least 2, got {}",
                self.retarget_interval
            )));
        }
        if self.mining_workers == 0 {
            return Err(Error::InvalidInput("mining_workers must be positive".into()));
        }
        Ok(())
    }

    /// Expected duration of one retarget window (ms)
    pub fn expected_window_ms(&self) -> u64 {
        self.retarget_interval
            .saturating_mul(self.target_block_secs)
            .saturating_mul(1_000)
    }
}

/// Mixer parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Pool size below which mixing is a no-op
    pub min_mix_size: usize,

    /// Upper bound of the random delay added to each mixed transaction (ms)
    pub max_jitter_ms: u64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            min_mix_size: MIN_MIX_SIZE,
            max_jitter_ms: MAX_MIX_JITTER_MS,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
