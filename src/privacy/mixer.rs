//! Transaction Mixer
//!
//! Extra unlinkability on top of ring signatures and stealth outputs:
//! - batch mixing: once enough transactions are pooled, release them in
//!   random order with random timing jitter
//! - chained mixing: route a payment through fresh relay wallets, each hop
//!   spent with the one-time key of the previous hop's output

use crate::config::MixerConfig;
use crate::crypto::group::Ristretto;
use crate::crypto::keys::{KeyPair, WalletKeys};
use crate::privacy::stealth::Stealth;
use crate::structures::transaction::{Transaction, TransactionBuilder};
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Pool of transactions waiting to be mixed
pub struct TransactionMixer {
    config: MixerConfig,
    pool: Mutex<Vec<Transaction>>,
    rng: Mutex<ChaCha20Rng>,
}

impl TransactionMixer {
    /// Mixer with default settings, seeded from OS entropy
    pub fn new() -> Self {
        Self::with_config(MixerConfig::default())
    }

    /// Mixer with custom settings, seeded from OS entropy
    pub fn with_config(config: MixerConfig) -> Self {
        Self::with_rng(config, ChaCha20Rng::from_entropy())
    }

    /// Reproducible shuffles and jitter
    pub fn seeded(config: MixerConfig, seed: [u8; 32]) -> Self {
        Self::with_rng(config, ChaCha20Rng::from_seed(seed))
    }

    fn with_rng(config: MixerConfig, rng: ChaCha20Rng) -> Self {
        Self {
            config,
            pool: Mutex::new(Vec::new()),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Add transaction to mixing pool
    pub fn add_to_pool(&self, tx: Transaction) {
        let mut pool = lock(&self.pool);
        pool.push(tx);
        debug!(pool = pool.len(), "transaction added to mix pool");
    }

    pub fn pool_size(&self) -> usize {
        lock(&self.pool).len()
    }

    /// Release the pool shuffled and re-timed.
    ///
    /// Below `min_mix_size` nothing is released and the pool is untouched.
    pub fn mix_transactions(&self) -> Result<Vec<Transaction>> {
        let mut batch = {
            let mut pool = lock(&self.pool);
            if pool.len() < self.config.min_mix_size {
                debug!(pool = pool.len(), min = self.config.min_mix_size, "mix pool too small");
                return Ok(Vec::new());
            }
            std::mem::take(&mut *pool)
        };

        let delays: Vec<u64> = {
            let mut rng = lock(&self.rng);
            batch.shuffle(&mut *rng);
            (0..batch.len())
                .map(|_| rng.gen_range(0..=self.config.max_jitter_ms))
                .collect()
        };

        let mixed: Result<Vec<Transaction>> = batch
            .iter()
            .zip(delays)
            .map(|(tx, delay)| tx.with_delay(delay))
            .collect();

        match mixed {
            Ok(mixed) => {
                info!(count = mixed.len(), "mixed transaction batch");
                Ok(mixed)
            }
            Err(e) => {
                let mut pool = lock(&self.pool);
                let newer = std::mem::replace(&mut *pool, batch);
                pool.extend(newer);
                Err(e)
            }
        }
    }

    /// Route the payment described by `template` through `hops` relay wallets.
    ///
    /// Returns `hops + 1` transactions: one per relay, then the final one to
    /// the template's recipient. Hop `i + 1` is signed with the one-time key
    /// of hop `i`'s output.
    pub fn create_chained_mix<R: RngCore + CryptoRng>(
        template: &TransactionBuilder,
        hops: usize,
        rng: &mut R,
    ) -> Result<Vec<Transaction>> {
        let mut chain = Vec::with_capacity(hops + 1);
        let mut next = template.clone();

        for hop in 0..hops {
            let relay: WalletKeys = WalletKeys::generate(rng);
            let tx = next.clone().recipient(relay.stealth_address()).build(rng)?;

            let output = tx
                .stealth_output
                .ok_or_else(|| Error::Validation("hop transaction without stealth output".into()))?;
            let secret = Stealth::<Ristretto>::derive_spend_secret(&output, relay.view.secret(), relay.spend.secret())?;
            let hop_key: KeyPair = KeyPair::from_secret(secret);

            debug!(hop, id = %tx.id, "chained mix hop");
            chain.push(tx);
            next = template.clone().signer(&hop_key);
        }

        chain.push(next.build(rng)?);
        info!(hops, "chained mix created");
        Ok(chain)
    }
}

impl Default for TransactionMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionMixer")
            .field("config", &self.config)
            .field("pool", &self.pool_size())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
