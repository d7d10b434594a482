//! End-to-end chain tests
//!
//! Mining, retargeting, validation after tampering, and balances seen by
//! outside observers versus wallet owners.

use bytechan_core::consensus::pow::{CancelToken, MiningObserver};
use bytechan_core::structures::types::now_ms;
use bytechan_core::{
    Block, Blockchain, ChainConfig, ChainSnapshot, Error, Hash256, KeyPair, PrivacyLevel,
    Ristretto, Transaction, TransactionBuilder, WalletKeys,
};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config(difficulty: u32) -> ChainConfig {
    ChainConfig {
        initial_difficulty: difficulty,
        mining_workers: 2,
        ..ChainConfig::default()
    }
}

fn decoys(n: usize) -> Vec<[u8; 32]> {
    (0..n)
        .map(|_| KeyPair::<Ristretto>::generate(&mut OsRng).public_bytes())
        .collect()
}

fn blocks_of(chain: &Blockchain) -> Vec<Block> {
    chain.snapshot().blocks().iter().map(|b| (**b).clone()).collect()
}

#[test]
fn test_mine_one_block_at_difficulty_two() -> anyhow::Result<()> {
    bytechan_core::logging::init("warn");
    let chain = Blockchain::new(config(2))?;
    let miner: KeyPair = KeyPair::generate(&mut OsRng);
    let address = miner.derive_address();

    let block = chain.mine_pending_transactions(&address)?;

    assert_eq!(chain.len(), 2);
    assert!(block.hash.to_hex().starts_with("00"));
    assert_eq!(chain.get_balance(&address), i128::from(chain.config().mining_reward));
    assert!(chain.is_valid());
    Ok(())
}

#[test]
fn test_genesis_links() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    chain.mine_pending_transactions("bc1miner")?;
    chain.mine_pending_transactions("bc1miner")?;

    let snapshot = chain.snapshot();
    let blocks = snapshot.blocks();
    assert_eq!(blocks[0].index, 0);
    assert_eq!(blocks[0].previous_hash, Hash256::ZERO);
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].hash);
        assert_eq!(pair[1].calculate_hash()?, pair[1].hash);
    }
    Ok(())
}

#[test]
fn test_tampering_is_detected() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);

    let tx = TransactionBuilder::new(&alice.spend, bob.stealth_address(), 25)
        .privacy(PrivacyLevel::Low)
        .decoys(&decoys(6))
        .build(&mut OsRng)?;
    chain.add_transaction(tx)?;
    chain.mine_pending_transactions("bc1miner")?;
    chain.mine_pending_transactions("bc1miner")?;
    assert!(chain.is_valid());

    // Edited amount without re-hashing: hash mismatch
    let mut blocks = blocks_of(&chain);
    blocks[1].transactions[0].amount = Some(25_000);
    assert!(!ChainSnapshot::from_blocks(blocks, &config(1))?.is_valid());

    // Edited amount with a re-hashed, re-mined block: the commitment no longer opens
    let mut blocks = blocks_of(&chain);
    blocks[1].transactions[0].amount = Some(25_000);
    blocks[1].transactions[0].id = blocks[1].transactions[0].compute_id()?;
    blocks[1].mine(1, 1, &CancelToken::new(), &bytechan_core::TracingObserver)?;
    let err = ChainSnapshot::from_blocks(blocks, &config(1))?.validate().unwrap_err();
    assert!(matches!(err, Error::Chain(_)));

    // Re-mined block breaks the link of its successor
    let mut blocks = blocks_of(&chain);
    blocks[1].timestamp += 1;
    blocks[1].mine(1, 1, &CancelToken::new(), &bytechan_core::TracingObserver)?;
    assert!(!ChainSnapshot::from_blocks(blocks, &config(1))?.is_valid());
    Ok(())
}

#[test]
fn test_replayed_key_image_is_detected() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);

    let tx = TransactionBuilder::new(&alice.spend, bob.stealth_address(), 5)
        .privacy(PrivacyLevel::Low)
        .decoys(&decoys(6))
        .build(&mut OsRng)?;
    chain.add_transaction(tx.clone())?;
    chain.mine_pending_transactions("bc1miner")?;

    // Splice the same transaction into a second block
    let mut blocks = blocks_of(&chain);
    let tip = blocks.last().cloned().ok_or_else(|| anyhow::anyhow!("empty chain"))?;
    let mut replay = Block::new(tip.index + 1, tip.timestamp + 1, vec![tx], tip.hash)?;
    replay.mine(1, 1, &CancelToken::new(), &bytechan_core::TracingObserver)?;
    blocks.push(replay);

    let err = ChainSnapshot::from_blocks(blocks, &config(1))?.validate().unwrap_err();
    assert!(matches!(err, Error::DoubleSpend(_)));
    Ok(())
}

#[test]
fn test_fast_blocks_raise_difficulty() -> anyhow::Result<()> {
    let chain = Blockchain::new(ChainConfig {
        initial_difficulty: 1,
        retarget_interval: 3,
        genesis_timestamp: now_ms(),
        mining_workers: 2,
        ..ChainConfig::default()
    })?;

    for _ in 0..3 {
        chain.mine_pending_transactions("bc1miner")?;
    }
    // Three blocks in far less than 0.8 * 3 * 120 s
    assert_eq!(chain.difficulty(), 2);
    assert!(chain.is_valid());
    Ok(())
}

/// Genesis plus `retarget_interval - 1` evenly spaced blocks spanning `span_ms`
fn timed_chain(config: &ChainConfig, span_ms: u64) -> anyhow::Result<ChainSnapshot> {
    let gap = span_ms / (config.retarget_interval - 1);
    let mut blocks = vec![Block::genesis(config.genesis_timestamp)?];
    for index in 1..config.retarget_interval {
        let previous = blocks[blocks.len() - 1].hash;
        let mut block = Block::new(index, config.genesis_timestamp + index * gap, Vec::new(), previous)?;
        block.mine(1, 1, &CancelToken::new(), &bytechan_core::TracingObserver)?;
        blocks.push(block);
    }
    Ok(ChainSnapshot::from_blocks(blocks, config)?)
}

#[test]
fn test_ten_block_window_moves_difficulty_by_one() -> anyhow::Result<()> {
    let config = config(4);
    let expected = config.expected_window_ms();

    let fast = timed_chain(&config, expected / 2)?;
    assert_eq!(fast.len(), 10);
    assert!(fast.is_valid());
    assert_eq!(fast.next_difficulty(&config), 5);

    let slow = timed_chain(&config, expected * 13 / 10)?;
    assert_eq!(slow.next_difficulty(&config), 3);

    let steady = timed_chain(&config, expected)?;
    assert_eq!(steady.next_difficulty(&config), 4);
    Ok(())
}

#[test]
fn test_slow_window_never_drops_below_one() -> anyhow::Result<()> {
    let config = config(1);
    let slow = timed_chain(&config, config.expected_window_ms() * 13 / 10)?;
    assert_eq!(slow.next_difficulty(&config), 1);
    Ok(())
}

#[test]
fn test_single_block_window_is_rejected() {
    let err = Blockchain::new(ChainConfig {
        retarget_interval: 1,
        ..config(1)
    })
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_confidential_amounts_need_view_key() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);

    chain.mine_pending_transactions(&alice.address())?;
    let reward = i128::from(chain.config().mining_reward);

    let tx = TransactionBuilder::new(&alice.spend, bob.stealth_address(), 400)
        .privacy(PrivacyLevel::Low)
        .confidential(true)
        .decoys(&decoys(6))
        .sender_view_key(alice.view.public_bytes())
        .build(&mut OsRng)?;
    let recipient_label = tx.recipient.clone();
    chain.add_transaction(tx)?;
    chain.mine_pending_transactions("bc1other")?;

    // Outside observers see neither side of the confidential transfer
    assert_eq!(chain.get_balance(&recipient_label), 0);
    assert_eq!(chain.get_balance(&alice.address()), reward);

    // Wallet owners do
    assert_eq!(chain.get_wallet_balance(&bob), 400);
    assert_eq!(chain.get_wallet_balance(&alice), reward - 400);
    Ok(())
}

#[test]
fn test_received_output_can_be_spent_onward() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);
    let carol: WalletKeys = WalletKeys::generate(&mut OsRng);

    let first = TransactionBuilder::new(&alice.spend, bob.stealth_address(), 90)
        .privacy(PrivacyLevel::Low)
        .decoys(&decoys(6))
        .build(&mut OsRng)?;
    chain.add_transaction(first)?;
    chain.mine_pending_transactions("bc1miner")?;

    let owned = chain
        .scan_outputs(bob.view.secret(), bob.spend.public_key())
        .next()
        .ok_or_else(|| anyhow::anyhow!("bob owns no output"))?;
    assert_eq!(owned.amount, Some(90));

    let one_time = bytechan_core::Stealth::<Ristretto>::derive_spend_secret(
        &owned.output,
        bob.view.secret(),
        bob.spend.secret(),
    )?;
    let one_time: KeyPair = KeyPair::from_secret(one_time);
    let onward = TransactionBuilder::new(&one_time, carol.stealth_address(), 60)
        .privacy(PrivacyLevel::Low)
        .decoys(&decoys(6))
        .build(&mut OsRng)?;
    chain.add_transaction(onward)?;
    chain.mine_pending_transactions("bc1miner")?;

    assert_eq!(chain.get_wallet_balance(&bob), 30);
    assert_eq!(chain.get_wallet_balance(&carol), 60);
    assert!(chain.is_valid());
    Ok(())
}

#[test]
fn test_scanner_resumes_from_cursor() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);

    let carol: WalletKeys = WalletKeys::generate(&mut OsRng);

    // A spend key can sign only once, so each transfer has its own sender
    for (sender, amount) in [(&alice, 10u64), (&carol, 20)] {
        let tx = TransactionBuilder::new(&sender.spend, bob.stealth_address(), amount)
            .privacy(PrivacyLevel::Low)
            .decoys(&decoys(6))
            .build(&mut OsRng)?;
        chain.add_transaction(tx)?;
        chain.mine_pending_transactions("bc1miner")?;
    }

    let mut scanner = chain.scan_outputs(bob.view.secret(), bob.spend.public_key());
    let first = scanner.next().ok_or_else(|| anyhow::anyhow!("missing first output"))?;
    assert_eq!(first.block_index, 1);
    assert_eq!(first.amount, Some(10));

    let resumed = bytechan_core::OutputScanner::resume(
        chain.snapshot(),
        *bob.view.secret(),
        *bob.spend.public_key(),
        scanner.cursor() + 1,
    );
    let amounts: Vec<Option<u64>> = resumed.map(|o| o.amount).collect();
    assert_eq!(amounts, vec![Some(20)]);
    Ok(())
}

#[test]
fn test_cancelled_mining_keeps_pool() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(64))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);
    let tx = TransactionBuilder::new(&alice.spend, bob.stealth_address(), 5)
        .privacy(PrivacyLevel::Low)
        .decoys(&decoys(6))
        .build(&mut OsRng)?;
    chain.add_transaction(tx)?;

    let cancel = CancelToken::new();
    let stopper = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stopper.cancel();
    });
    let result = chain.mine_pending_transactions_with("bc1miner", &cancel);
    handle.join().map_err(|_| anyhow::anyhow!("cancel thread panicked"))?;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(chain.pending_transactions().len(), 1);
    assert_eq!(chain.len(), 1);
    Ok(())
}

#[test]
fn test_second_spend_during_mining_is_rejected() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(64))?;
    let alice: WalletKeys = WalletKeys::generate(&mut OsRng);
    let bob: WalletKeys = WalletKeys::generate(&mut OsRng);
    let spend = |amount| {
        TransactionBuilder::new(&alice.spend, bob.stealth_address(), amount)
            .privacy(PrivacyLevel::Low)
            .decoys(&decoys(6))
            .build(&mut OsRng)
    };
    chain.add_transaction(spend(5)?)?;
    let respend = spend(7)?;

    let cancel = CancelToken::new();
    let (second, mined) = std::thread::scope(|s| {
        let miner = s.spawn(|| chain.mine_pending_transactions_with("bc1miner", &cancel));
        std::thread::sleep(Duration::from_millis(300));
        let second = chain.add_transaction(respend);
        cancel.cancel();
        (second, miner.join())
    });
    let mined = mined.map_err(|_| anyhow::anyhow!("miner panicked"))?;

    assert!(matches!(second, Err(Error::DoubleSpend(_))));
    assert!(matches!(mined, Err(Error::Cancelled)));

    let pool = chain.pending_transactions();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].amount, Some(5));
    assert_eq!(chain.len(), 1);
    Ok(())
}

#[test]
fn test_inflated_reward_breaks_validation() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    chain.mine_pending_transactions("bc1miner")?;
    chain.mine_pending_transactions("bc1miner")?;

    // Well-formed reward paying ten times the configured amount, re-mined
    let mut blocks = blocks_of(&chain);
    let tip = blocks.len() - 1;
    let inflated = chain.config().mining_reward * 10;
    blocks[tip].transactions = vec![Transaction::reward("bc1miner", inflated, blocks[tip].timestamp)?];
    blocks[tip].mine(1, 1, &CancelToken::new(), &bytechan_core::TracingObserver)?;

    let err = ChainSnapshot::from_blocks(blocks, chain.config())?.validate().unwrap_err();
    assert!(matches!(err, Error::Chain(_)));
    Ok(())
}

#[test]
fn test_custom_observer_receives_seal() -> anyhow::Result<()> {
    #[derive(Default)]
    struct Seals(AtomicU64);
    impl MiningObserver for Seals {
        fn on_sealed(&self, _: u64, _: u64, _: &Hash256, _: u64, _: Duration) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    let observer = Arc::new(Seals::default());
    let chain = Blockchain::with_observer(config(1), observer.clone())?;
    chain.mine_pending_transactions("bc1miner")?;
    chain.mine_pending_transactions("bc1miner")?;

    assert_eq!(observer.0.load(Ordering::Relaxed), 2);
    Ok(())
}

#[test]
fn test_reward_submission_rejected() -> anyhow::Result<()> {
    let chain = Blockchain::new(config(1))?;
    let forged = Transaction::reward("bc1thief", 1_000_000, now_ms())?;
    assert!(matches!(chain.add_transaction(forged), Err(Error::Validation(_))));
    Ok(())
}
