//! Chain State Management
//!
//! Tracks:
//! - Blocks from genesis to tip
//! - Current proof-of-work difficulty
//! - Spent key images (double-spend detection)
//! - Pending transaction pool
//!
//! Readers take an `Arc<ChainSnapshot>` and never block the writer; every
//! mutation builds a new snapshot under the writer lock and swaps it in.

use crate::config::ChainConfig;
use crate::consensus::difficulty::{is_retarget_height, retarget, window_elapsed};
use crate::consensus::pow::{CancelToken, MiningObserver, NonceSearch, Target, TracingObserver};
use crate::crypto::group::{Group, Ristretto};
use crate::crypto::keys::WalletKeys;
use crate::privacy::ring::{KeyImage, Lsag};
use crate::privacy::stealth::{OutputScanner, Stealth};
use crate::structures::block::Block;
use crate::structures::transaction::Transaction;
use crate::structures::types::{now_ms, Amount, Hash256};
use crate::{Error, Result};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Immutable view of the chain at one point in time
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    blocks: Vec<Arc<Block>>,
    difficulty: u32,
    mining_reward: Amount,
    spent: HashSet<KeyImage>,
}

impl ChainSnapshot {
    /// Chain holding only the genesis block
    pub fn genesis(config: &ChainConfig) -> Result<Self> {
        let genesis = Block::genesis(config.genesis_timestamp)?;
        Ok(Self {
            blocks: vec![Arc::new(genesis)],
            difficulty: config.initial_difficulty,
            mining_reward: config.mining_reward,
            spent: HashSet::new(),
        })
    }

    /// Snapshot over arbitrary blocks, e.g. received from a peer, judged by
    /// the rules in `config`.
    ///
    /// Nothing is checked here; call `validate`.
    pub fn from_blocks(blocks: Vec<Block>, config: &ChainConfig) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::Chain("a chain needs at least a genesis block".into()));
        }
        let spent = blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter_map(|tx| tx.key_image().copied())
            .collect();
        Ok(Self {
            blocks: blocks.into_iter().map(Arc::new).collect(),
            difficulty: config.initial_difficulty,
            mining_reward: config.mining_reward,
            spent,
        })
    }

    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Chain tip
    pub fn latest_block(&self) -> &Arc<Block> {
        // A snapshot always holds at least the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    /// Difficulty of the next block
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Key image already used on chain
    pub fn is_spent(&self, key_image: &KeyImage) -> bool {
        self.spent.contains(key_image)
    }

    /// `true` iff `validate` succeeds
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Recompute every hash, check every link and transaction.
    ///
    /// Reports the first defect; nothing is repaired.
    pub fn validate(&self) -> Result<()> {
        let genesis = &self.blocks[0];
        if genesis.index != 0 || !genesis.previous_hash.is_zero() {
            return Err(Error::Chain("malformed genesis block".into()));
        }
        if !genesis.has_valid_hash() {
            return Err(Error::Chain("genesis hash mismatch".into()));
        }

        let floor = Target::from_difficulty(1)?;
        let mut seen = HashSet::new();
        for pair in self.blocks.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);

            if block.index != prev.index + 1 {
                return Err(Error::Chain(format!("block {} out of sequence", block.index)));
            }
            if !block.has_valid_hash() {
                return Err(Error::Chain(format!("block {} hash mismatch", block.index)));
            }
            if block.previous_hash != prev.hash {
                return Err(Error::Chain(format!("block {} does not link to its parent", block.index)));
            }
            if !floor.is_met_by(&block.hash) {
                return Err(Error::Chain(format!("block {} has no proof of work", block.index)));
            }
            let mut rewards = block.transactions.iter().filter(|tx| tx.is_reward());
            if let Some(reward) = rewards.next() {
                if reward.amount != Some(self.mining_reward) {
                    return Err(Error::Chain(format!(
                        "block {} pays a reward of {:?}, expected {}",
                        block.index, reward.amount, self.mining_reward
                    )));
                }
            }
            if rewards.next().is_some() {
                return Err(Error::Chain(format!("block {} pays more than one reward", block.index)));
            }

            for tx in &block.transactions {
                tx.validate().map_err(|e| {
                    Error::Chain(format!("block {} transaction {}: {}", block.index, tx.id, e))
                })?;
                if let Some(image) = tx.key_image() {
                    if !seen.insert(*image) {
                        return Err(Error::DoubleSpend(image.to_hex()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Public ledger view: received minus sent plaintext amounts.
    ///
    /// Confidential amounts are invisible here; see `get_wallet_balance`.
    pub fn get_balance(&self, address: &str) -> i128 {
        let mut balance: i128 = 0;
        for tx in self.transactions() {
            let Some(amount) = tx.amount else {
                continue;
            };
            if tx.recipient == address {
                balance += i128::from(amount);
            }
            if tx.sender == address {
                balance -= i128::from(amount);
            }
        }
        balance
    }

    /// Balance as seen by the wallet's own keys.
    ///
    /// Credits rewards to the plain address and stealth outputs whose amount
    /// opens their commitment. Debits transactions signed by the spend key or
    /// by a one-time key of an owned output, read back through the sender
    /// note when confidential.
    pub fn get_wallet_balance(&self, keys: &WalletKeys) -> i128 {
        let address = keys.address();
        let mut own_labels = HashSet::new();
        own_labels.insert(keys.sender_label());

        let mut balance: i128 = 0;
        for tx in self.transactions() {
            if tx.is_reward() {
                if tx.recipient == address {
                    balance += i128::from(tx.amount.unwrap_or(0));
                }
                continue;
            }
            let Some(output) = &tx.stealth_output else {
                continue;
            };
            if !Stealth::<Ristretto>::is_owned(output, keys.view.secret(), keys.spend.public_key()) {
                continue;
            }
            if let Ok(x) = Stealth::<Ristretto>::derive_spend_secret(output, keys.view.secret(), keys.spend.secret()) {
                let public = Ristretto::mul_base(&x);
                own_labels.insert(Lsag::<Ristretto>::key_image(&x, &public).label());
            }
            let amount = Stealth::<Ristretto>::shared_secret(output, keys.view.secret())
                .and_then(|shared| tx.reveal_amount(&shared));
            balance += i128::from(amount.unwrap_or(0));
        }

        for tx in self.transactions() {
            if tx.is_reward() || !own_labels.contains(&tx.sender) {
                continue;
            }
            balance -= i128::from(tx.reveal_sent_amount(keys.view.secret()).unwrap_or(0));
        }
        balance
    }

    fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|b| b.transactions.iter())
    }

    /// Difficulty after applying the retarget rule to the window of the
    /// last `retarget_interval` blocks
    pub fn next_difficulty(&self, config: &ChainConfig) -> u32 {
        match window_elapsed(&self.blocks, config.retarget_interval) {
            Some(elapsed) => retarget(self.difficulty, elapsed, config.expected_window_ms()),
            None => self.difficulty,
        }
    }

    /// New snapshot with `block` appended
    fn append(&self, block: Block) -> Self {
        let mut next = self.clone();
        next.spent
            .extend(block.transactions.iter().filter_map(|tx| tx.key_image().copied()));
        next.blocks.push(Arc::new(block));
        next
    }
}

/// Pending transactions.
///
/// `in_flight` holds the key images of the batch being mined; they are in
/// neither the queue nor the published chain until the block lands.
#[derive(Debug, Default)]
struct Pool {
    queued: Vec<Transaction>,
    in_flight: HashSet<KeyImage>,
}

impl Pool {
    fn holds(&self, image: &KeyImage) -> bool {
        self.in_flight.contains(image) || self.queued.iter().any(|tx| tx.key_image() == Some(image))
    }
}

/// Single-writer blockchain with a pending pool.
///
/// Lock order is `writer`, then `pending`, then `state`.
pub struct Blockchain {
    config: ChainConfig,
    state: RwLock<Arc<ChainSnapshot>>,
    pending: Mutex<Pool>,
    writer: Mutex<()>,
    observer: Arc<dyn MiningObserver>,
}

impl Blockchain {
    /// New chain with a genesis block, logging mining through `tracing`
    pub fn new(config: ChainConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// New chain reporting mining progress to `observer`
    pub fn with_observer(config: ChainConfig, observer: Arc<dyn MiningObserver>) -> Result<Self> {
        config.validate()?;
        let genesis = ChainSnapshot::genesis(&config)?;
        info!(
            genesis = %genesis.latest_block().hash,
            difficulty = config.initial_difficulty,
            "chain initialised"
        );
        Ok(Self {
            config,
            state: RwLock::new(Arc::new(genesis)),
            pending: Mutex::new(Pool::default()),
            writer: Mutex::new(()),
            observer,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Current immutable view
    pub fn snapshot(&self) -> Arc<ChainSnapshot> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, snapshot: ChainSnapshot) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn latest_block(&self) -> Arc<Block> {
        Arc::clone(self.snapshot().latest_block())
    }

    pub fn difficulty(&self) -> u32 {
        self.snapshot().difficulty()
    }

    /// Copy of the pending pool
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        lock(&self.pending).queued.clone()
    }

    /// Validate and queue a transaction; returns its id.
    ///
    /// Rewards cannot be submitted, and a key image already on chain, queued,
    /// or in the block being mined is a double spend.
    pub fn add_transaction(&self, tx: Transaction) -> Result<Hash256> {
        if tx.is_reward() {
            warn!(id = %tx.id, "rejected submitted reward transaction");
            return Err(Error::Validation("reward transactions are created by mining only".into()));
        }
        if let Err(e) = tx.validate() {
            warn!(id = %tx.id, error = %e, "rejected invalid transaction");
            return Err(e);
        }
        let image = *tx
            .key_image()
            .ok_or_else(|| Error::Validation("missing ring signature".into()))?;

        // Mining publishes and clears `in_flight` under this lock
        let mut pool = lock(&self.pending);
        if self.snapshot().is_spent(&image) {
            warn!(id = %tx.id, key_image = %image.to_hex(), "double spend against chain");
            return Err(Error::DoubleSpend(image.to_hex()));
        }
        if pool.holds(&image) {
            warn!(id = %tx.id, key_image = %image.to_hex(), "double spend against pool");
            return Err(Error::DoubleSpend(image.to_hex()));
        }
        let id = tx.id;
        pool.queued.push(tx);
        debug!(id = %id, pool = pool.queued.len(), "transaction queued");
        Ok(id)
    }

    /// Mine the pool into a new block paying `reward_address`
    pub fn mine_pending_transactions(&self, reward_address: &str) -> Result<Arc<Block>> {
        self.mine_pending_transactions_with(reward_address, &CancelToken::new())
    }

    /// Like `mine_pending_transactions`, stoppable through `cancel`.
    ///
    /// On cancellation the drained transactions go back to the pool.
    pub fn mine_pending_transactions_with(&self, reward_address: &str, cancel: &CancelToken) -> Result<Arc<Block>> {
        let _writer = lock(&self.writer);
        let snapshot = self.snapshot();
        let search = NonceSearch::new(snapshot.difficulty(), cancel, self.observer.as_ref())?
            .workers(self.config.mining_workers)
            .progress_interval(self.config.progress_interval);
        let mut included = {
            let mut pool = lock(&self.pending);
            let drained = std::mem::take(&mut pool.queued);
            pool.in_flight = drained.iter().filter_map(|tx| tx.key_image().copied()).collect();
            drained
        };

        let tip = snapshot.latest_block();
        let timestamp = now_ms().max(tip.timestamp);
        let reward = match Transaction::reward(reward_address, self.config.mining_reward, timestamp) {
            Ok(reward) => reward,
            Err(e) => {
                self.restore(included);
                return Err(e);
            }
        };

        let user_count = included.len();
        included.push(reward);
        let mut block = Block {
            index: tip.index + 1,
            timestamp,
            transactions: included,
            previous_hash: tip.hash,
            nonce: 0,
            hash: Hash256::ZERO,
        };

        let sealed = block
            .hash_template()
            .and_then(|template| search.run(block.index, &template));

        let (nonce, hash) = match sealed {
            Ok(found) => found,
            Err(e) => {
                block.transactions.truncate(user_count);
                let restored = std::mem::take(&mut block.transactions);
                info!(index = block.index, restored = restored.len(), error = %e, "mining stopped");
                self.restore(restored);
                return Err(e);
            }
        };
        block.seal(nonce, hash);

        let mut next = snapshot.append(block);
        let tip_index = next.latest_block().index;
        if is_retarget_height(tip_index, self.config.retarget_interval) {
            let adjusted = next.next_difficulty(&self.config);
            if adjusted != next.difficulty {
                info!(index = tip_index, from = next.difficulty, to = adjusted, "difficulty retargeted");
            }
            next.difficulty = adjusted;
        }

        let sealed = Arc::clone(next.latest_block());
        info!(
            index = sealed.index,
            hash = %sealed.hash,
            txs = sealed.transactions.len(),
            difficulty = next.difficulty,
            "block appended"
        );
        let mut pool = lock(&self.pending);
        self.publish(next);
        pool.in_flight.clear();
        Ok(sealed)
    }

    /// Apply the retarget rule to the latest window now; returns the new difficulty
    pub fn adjust_difficulty(&self) -> u32 {
        let _writer = lock(&self.writer);
        let snapshot = self.snapshot();
        let adjusted = snapshot.next_difficulty(&self.config);
        if adjusted != snapshot.difficulty {
            info!(from = snapshot.difficulty, to = adjusted, "difficulty retargeted");
            let mut next = (*snapshot).clone();
            next.difficulty = adjusted;
            self.publish(next);
        }
        adjusted
    }

    /// Put drained transactions back ahead of anything queued since
    fn restore(&self, drained: Vec<Transaction>) {
        let mut pool = lock(&self.pending);
        pool.in_flight.clear();
        let newer = std::mem::replace(&mut pool.queued, drained);
        pool.queued.extend(newer);
    }

    pub fn is_valid(&self) -> bool {
        self.snapshot().is_valid()
    }

    pub fn validate(&self) -> Result<()> {
        self.snapshot().validate()
    }

    pub fn get_balance(&self, address: &str) -> i128 {
        self.snapshot().get_balance(address)
    }

    pub fn get_wallet_balance(&self, keys: &WalletKeys) -> i128 {
        self.snapshot().get_wallet_balance(keys)
    }

    /// Lazily scan the current snapshot for outputs owned by a view key
    pub fn scan_outputs(&self, view_secret: &Scalar, spend_public: &RistrettoPoint) -> OutputScanner {
        OutputScanner::new(self.snapshot(), *view_secret, *spend_public)
    }
}

impl std::fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Blockchain")
            .field("len", &snapshot.len())
            .field("difficulty", &snapshot.difficulty())
            .field("tip", &snapshot.latest_block().hash)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;
    use crate::structures::transaction::{PrivacyLevel, TransactionBuilder};
    use rand::rngs::OsRng;

    fn fast_config() -> ChainConfig {
        ChainConfig {
            initial_difficulty: 1,
            mining_workers: 2,
            ..ChainConfig::default()
        }
    }

    fn decoys(n: usize) -> Vec<[u8; 32]> {
        (0..n)
            .map(|_| KeyPair::<Ristretto>::generate(&mut OsRng).public_bytes())
            .collect()
    }

    fn transfer(from: &WalletKeys, to: &WalletKeys, amount: u64) -> Transaction {
        TransactionBuilder::new(&from.spend, to.stealth_address(), amount)
            .privacy(PrivacyLevel::Low)
            .decoys(&decoys(6))
            .build(&mut OsRng)
            .unwrap()
    }

    #[test]
    fn test_new_chain_has_genesis() {
        let chain = Blockchain::new(fast_config()).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.latest_block().index, 0);
        assert!(chain.latest_block().previous_hash.is_zero());
        assert!(chain.is_valid());
    }

    #[test]
    fn test_mine_appends_and_pays_reward() {
        let chain = Blockchain::new(fast_config()).unwrap();
        let block = chain.mine_pending_transactions("bc1miner").unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(block.previous_hash, chain.snapshot().blocks()[0].hash);
        assert_eq!(chain.get_balance("bc1miner"), i128::from(chain.config().mining_reward));
        assert!(chain.is_valid());
    }

    #[test]
    fn test_pool_drained_into_block() {
        let chain = Blockchain::new(fast_config()).unwrap();
        let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
        let bob: WalletKeys = WalletKeys::generate(&mut OsRng);

        chain.add_transaction(transfer(&alice, &bob, 3)).unwrap();
        assert_eq!(chain.pending_transactions().len(), 1);

        let block = chain.mine_pending_transactions("bc1miner").unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert!(chain.pending_transactions().is_empty());
        assert!(chain.is_valid());
    }

    #[test]
    fn test_double_spend_rejected_in_pool_and_chain() {
        let chain = Blockchain::new(fast_config()).unwrap();
        let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
        let bob: WalletKeys = WalletKeys::generate(&mut OsRng);

        chain.add_transaction(transfer(&alice, &bob, 3)).unwrap();
        let err = chain.add_transaction(transfer(&alice, &bob, 4)).unwrap_err();
        assert!(matches!(err, Error::DoubleSpend(_)));

        chain.mine_pending_transactions("bc1miner").unwrap();
        let err = chain.add_transaction(transfer(&alice, &bob, 5)).unwrap_err();
        assert!(matches!(err, Error::DoubleSpend(_)));
    }

    #[test]
    fn test_submitted_reward_rejected() {
        let chain = Blockchain::new(fast_config()).unwrap();
        let reward = Transaction::reward("bc1me", 1_000, now_ms()).unwrap();
        assert!(matches!(chain.add_transaction(reward), Err(Error::Validation(_))));
    }

    #[test]
    fn test_cancel_restores_pool() {
        let chain = Blockchain::new(ChainConfig {
            initial_difficulty: 64,
            ..fast_config()
        })
        .unwrap();
        let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
        let bob: WalletKeys = WalletKeys::generate(&mut OsRng);
        let tx = transfer(&alice, &bob, 3);
        chain.add_transaction(tx.clone()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = chain.mine_pending_transactions_with("bc1miner", &cancel).unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending_transactions(), vec![tx]);
    }

    #[test]
    fn test_spend_while_block_is_mined_is_double_spend() {
        let chain = Blockchain::new(ChainConfig {
            initial_difficulty: 64,
            ..fast_config()
        })
        .unwrap();
        let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
        let bob: WalletKeys = WalletKeys::generate(&mut OsRng);
        let first = transfer(&alice, &bob, 3);
        chain.add_transaction(first.clone()).unwrap();

        let cancel = CancelToken::new();
        let (second, result) = std::thread::scope(|s| {
            let miner = s.spawn(|| chain.mine_pending_transactions_with("bc1miner", &cancel));
            // Wait for the miner to drain the pool
            for _ in 0..1_000 {
                if chain.pending_transactions().is_empty() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            let second = chain.add_transaction(transfer(&alice, &bob, 4));
            cancel.cancel();
            (second, miner.join().unwrap())
        });

        assert!(matches!(second, Err(Error::DoubleSpend(_))));
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(chain.pending_transactions(), vec![first]);

        // Restored entries are checked against the queue again
        assert!(matches!(
            chain.add_transaction(transfer(&alice, &bob, 5)),
            Err(Error::DoubleSpend(_))
        ));
    }

    #[test]
    fn test_in_flight_images_cleared_after_block_lands() {
        let chain = Blockchain::new(fast_config()).unwrap();
        let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
        let bob: WalletKeys = WalletKeys::generate(&mut OsRng);
        chain.add_transaction(transfer(&alice, &bob, 3)).unwrap();
        chain.mine_pending_transactions("bc1miner").unwrap();

        assert!(lock(&chain.pending).in_flight.is_empty());
        let carol: WalletKeys = WalletKeys::generate(&mut OsRng);
        chain.add_transaction(transfer(&carol, &bob, 2)).unwrap();
    }

    #[test]
    fn test_inflated_reward_invalid() {
        let chain = Blockchain::new(fast_config()).unwrap();
        chain.mine_pending_transactions("bc1miner").unwrap();

        let mut blocks: Vec<Block> = chain.snapshot().blocks().iter().map(|b| (**b).clone()).collect();
        let inflated = chain.config().mining_reward * 100;
        blocks[1].transactions = vec![Transaction::reward("bc1miner", inflated, blocks[1].timestamp).unwrap()];
        blocks[1].mine(1, 1, &CancelToken::new(), &TracingObserver).unwrap();
        assert!(blocks[1].transactions[0].is_valid());

        let tampered = ChainSnapshot::from_blocks(blocks, &fast_config()).unwrap();
        assert!(matches!(tampered.validate(), Err(Error::Chain(_))));
    }

    #[test]
    fn test_tampered_snapshot_invalid() {
        let chain = Blockchain::new(fast_config()).unwrap();
        chain.mine_pending_transactions("bc1miner").unwrap();
        chain.mine_pending_transactions("bc1miner").unwrap();

        let mut blocks: Vec<Block> = chain.snapshot().blocks().iter().map(|b| (**b).clone()).collect();
        blocks[1].transactions[0].amount = Some(1_000_000_000);
        let tampered = ChainSnapshot::from_blocks(blocks, &fast_config()).unwrap();
        assert!(matches!(tampered.validate(), Err(Error::Chain(_))));
    }

    #[test]
    fn test_broken_link_invalid() {
        let chain = Blockchain::new(fast_config()).unwrap();
        chain.mine_pending_transactions("bc1miner").unwrap();
        chain.mine_pending_transactions("bc1miner").unwrap();

        let mut blocks: Vec<Block> = chain.snapshot().blocks().iter().map(|b| (**b).clone()).collect();
        blocks[2].previous_hash = Hash256([7u8; 32]);
        let tampered = ChainSnapshot::from_blocks(blocks, &fast_config()).unwrap();
        assert!(!tampered.is_valid());
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let chain = Blockchain::new(fast_config()).unwrap();
        let before = chain.snapshot();
        chain.mine_pending_transactions("bc1miner").unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(chain.snapshot().len(), 2);
    }

    #[test]
    fn test_adjust_difficulty_without_window_is_noop() {
        let chain = Blockchain::new(fast_config()).unwrap();
        assert_eq!(chain.adjust_difficulty(), 1);
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        assert!(matches!(ChainSnapshot::from_blocks(vec![], &fast_config()), Err(Error::Chain(_))));
    }
}
