//! Proof of Work
//!
//! Difficulty `d` means `d` leading zero hex digits. It is checked as a
//! numeric target: `target = 2^(256 - 4d) - 1`, and a hash (big-endian
//! 256-bit integer) meets `d` iff `hash <= target`. Byte-wise comparison of
//! the big-endian arrays is exactly that integer comparison.
//!
//! Nonce search runs on scoped threads. Worker `w` of `n` tries nonces
//! `w, w + n, w + 2n, ...`; the first hit stops the others through a shared
//! flag, as does an external `CancelToken`.

use crate::structures::block::HashTemplate;
use crate::structures::types::Hash256;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Largest supported difficulty (all 64 hex digits zero)
pub const MAX_DIFFICULTY: u32 = 64;

/// Default observer progress period, in attempts
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// 256-bit big-endian hash threshold
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Target {
    bytes: [u8; 32],
    difficulty: u32,
}

impl Target {
    /// `2^(256 - 4d) - 1`
    pub fn from_difficulty(difficulty: u32) -> Result<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(Error::InvalidInput(format!(
                "difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, difficulty
            )));
        }

        let mut bytes = [0xffu8; 32];
        let zero_bits = (difficulty * 4) as usize;
        for byte in bytes.iter_mut().take(zero_bits / 8) {
            *byte = 0;
        }
        if zero_bits % 8 == 4 {
            bytes[zero_bits / 8] = 0x0f;
        }

        Ok(Self { bytes, difficulty })
    }

    /// Numeric comparison `hash <= target`
    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        hash.0 <= self.bytes
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Target(d={}, {})", self.difficulty, hex::encode(&self.bytes[..8]))
    }
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every search holding a clone of this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Mining progress callbacks
pub trait MiningObserver: Send + Sync {
    /// Search started
    fn on_start(&self, _index: u64, _difficulty: u32, _workers: usize) {}

    /// Another `progress_interval` attempts done; `attempts` is the running total
    fn on_progress(&self, _index: u64, _attempts: u64) {}

    /// Nonce found
    fn on_sealed(&self, _index: u64, _nonce: u64, _hash: &Hash256, _attempts: u64, _elapsed: Duration) {}
}

/// Logs mining progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MiningObserver for TracingObserver {
    fn on_start(&self, index: u64, difficulty: u32, workers: usize) {
        debug!(index, difficulty, workers, "mining started");
    }

    fn on_progress(&self, index: u64, attempts: u64) {
        debug!(index, attempts, "mining progress");
    }

    fn on_sealed(&self, index: u64, nonce: u64, hash: &Hash256, attempts: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { attempts as f64 / secs } else { 0.0 };
        info!(
            index,
            nonce,
            hash = %hash,
            attempts,
            hash_rate = rate as u64,
            elapsed_ms = elapsed.as_millis() as u64,
            "block sealed"
        );
    }
}

/// Parallel nonce search configuration
pub struct NonceSearch<'a> {
    target: Target,
    workers: usize,
    progress_interval: u64,
    cancel: &'a CancelToken,
    observer: &'a dyn MiningObserver,
}

impl<'a> NonceSearch<'a> {
    pub fn new(difficulty: u32, cancel: &'a CancelToken, observer: &'a dyn MiningObserver) -> Result<Self> {
        Ok(Self {
            target: Target::from_difficulty(difficulty)?,
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel,
            observer,
        })
    }

    /// Number of threads (at least 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Attempts between observer progress callbacks (at least 1)
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Find `(nonce, hash)` with `hash <= target`.
    ///
    /// Returns `Error::Cancelled` if the token fired first.
    pub fn run(&self, index: u64, template: &HashTemplate) -> Result<(u64, Hash256)> {
        let started = Instant::now();
        self.observer.on_start(index, self.target.difficulty(), self.workers);

        let mut prefix_state = Sha256::new();
        prefix_state.update(template.prefix());

        let found = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let result: Mutex<Option<(u64, Hash256)>> = Mutex::new(None);
        let stride = self.workers as u64;

        std::thread::scope(|scope| {
            for worker in 0..stride {
                let prefix_state = &prefix_state;
                let found = &found;
                let attempts = &attempts;
                let result = &result;
                scope.spawn(move || {
                    let mut nonce = worker;
                    let mut local: u64 = 0;
                    let mut digits = [0u8; 20];
                    loop {
                        if found.load(Ordering::Relaxed) || self.cancel.is_cancelled() {
                            break;
                        }

                        let mut hasher = prefix_state.clone();
                        hasher.update(format_decimal(nonce, &mut digits));
                        hasher.update(template.suffix());
                        let hash = Hash256(hasher.finalize().into());

                        local += 1;
                        if local % self.progress_interval == 0 {
                            let total = attempts.fetch_add(self.progress_interval, Ordering::Relaxed)
                                + self.progress_interval;
                            self.observer.on_progress(index, total);
                        }

                        if self.target.is_met_by(&hash)
                            && found
                                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                                .is_ok()
                        {
                            *result.lock().unwrap_or_else(PoisonError::into_inner) = Some((nonce, hash));
                            break;
                        }

                        nonce = match nonce.checked_add(stride) {
                            Some(next) => next,
                            None => break,
                        };
                    }
                    attempts.fetch_add(local % self.progress_interval, Ordering::Relaxed);
                });
            }
        });

        let total = attempts.load(Ordering::Relaxed);
        let outcome = result.into_inner().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Some((nonce, hash)) => {
                self.observer.on_sealed(index, nonce, &hash, total, started.elapsed());
                Ok((nonce, hash))
            }
            None if self.cancel.is_cancelled() => {
                debug!(index, attempts = total, "mining cancelled");
                Err(Error::Cancelled)
            }
            None => Err(Error::Chain("nonce space exhausted".into())),
        }
    }
}

/// ASCII decimal digits of `value`, written into `buf`
fn format_decimal(mut value: u64, buf: &mut [u8; 20]) -> &[u8] {
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    &buf[pos..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::block::Block;

    fn hash_with_prefix(hex_prefix: &str) -> Hash256 {
        let mut hex = hex_prefix.to_string();
        while hex.len() < 64 {
            hex.push('f');
        }
        Hash256::from_hex(&hex).unwrap()
    }

    #[test]
    fn test_target_matches_leading_zero_digits() {
        for d in 0..=8u32 {
            let target = Target::from_difficulty(d).unwrap();
            let exact = hash_with_prefix(&"0".repeat(d as usize));
            assert!(target.is_met_by(&exact), "d={}", d);
            assert_eq!(exact.leading_zero_nibbles() >= d, target.is_met_by(&exact));

            if d > 0 {
                let short = hash_with_prefix(&format!("{}1", "0".repeat(d as usize - 1)));
                assert!(!target.is_met_by(&short), "d={}", d);
            }
        }
    }

    #[test]
    fn test_target_odd_difficulty_bytes() {
        let target = Target::from_difficulty(3).unwrap();
        assert_eq!(&target.as_bytes()[..3], &[0x00, 0x0f, 0xff]);
    }

    #[test]
    fn test_max_difficulty() {
        let target = Target::from_difficulty(64).unwrap();
        assert!(target.is_met_by(&Hash256::ZERO));
        let mut one = [0u8; 32];
        one[31] = 1;
        assert!(!target.is_met_by(&Hash256(one)));
        assert!(Target::from_difficulty(65).is_err());
    }

    #[test]
    fn test_format_decimal() {
        let mut buf = [0u8; 20];
        assert_eq!(format_decimal(0, &mut buf), b"0");
        assert_eq!(format_decimal(1234567890, &mut buf), b"1234567890");
        assert_eq!(format_decimal(u64::MAX, &mut buf), u64::MAX.to_string().as_bytes());
    }

    #[test]
    fn test_parallel_search_agrees_with_template() {
        let block = Block::genesis(1_000).unwrap();
        let template = block.hash_template().unwrap();
        let cancel = CancelToken::new();
        let observer = TracingObserver;

        let (nonce, hash) = NonceSearch::new(2, &cancel, &observer)
            .unwrap()
            .workers(4)
            .run(0, &template)
            .unwrap();

        assert_eq!(template.hash(nonce), hash);
        assert!(hash.leading_zero_nibbles() >= 2);
    }

    #[test]
    fn test_cancelled_search() {
        let block = Block::genesis(1_000).unwrap();
        let template = block.hash_template().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = NonceSearch::new(64, &cancel, &TracingObserver)
            .unwrap()
            .workers(2)
            .run(0, &template);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_observer_notified_on_seal() {
        struct Counting(AtomicU64, AtomicBool);
        impl MiningObserver for Counting {
            fn on_progress(&self, _index: u64, _attempts: u64) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
            fn on_sealed(&self, _: u64, _: u64, _: &Hash256, _: u64, _: Duration) {
                self.1.store(true, Ordering::Relaxed);
            }
        }

        let block = Block::genesis(1_000).unwrap();
        let template = block.hash_template().unwrap();
        let cancel = CancelToken::new();
        let observer = Counting(AtomicU64::new(0), AtomicBool::new(false));

        NonceSearch::new(3, &cancel, &observer)
            .unwrap()
            .progress_interval(16)
            .run(0, &template)
            .unwrap();

        assert!(observer.1.load(Ordering::Relaxed));
    }
}
