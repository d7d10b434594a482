//! Difficulty Retargeting
//!
//! Every `retarget_interval` blocks the time from the first to the last of
//! the most recent `retarget_interval` blocks is compared with the expected
//! `retarget_interval * target_block_secs`:
//! - faster than 0.8x expected: difficulty + 1
//! - slower than 1.2x expected: difficulty - 1 (never below 1)
//!
//! Integer arithmetic only (ratios scaled by 10).

use crate::consensus::pow::MAX_DIFFICULTY;
use crate::structures::block::Block;
use std::sync::Arc;

/// Lowest difficulty retargeting can reach
pub const MIN_DIFFICULTY: u32 = 1;

/// New difficulty for a window that took `actual_ms` against `expected_ms`
pub fn retarget(current: u32, actual_ms: u64, expected_ms: u64) -> u32 {
    let actual = u128::from(actual_ms) * 10;
    let expected = u128::from(expected_ms);

    if actual < expected * 8 {
        current.saturating_add(1).min(MAX_DIFFICULTY)
    } else if actual > expected * 12 {
        current.saturating_sub(1).max(MIN_DIFFICULTY)
    } else {
        current
    }
}

/// Whether the block at `tip_index` closes a retarget window
pub fn is_retarget_height(tip_index: u64, interval: u64) -> bool {
    interval > 0 && tip_index > 0 && tip_index % interval == 0
}

/// Milliseconds between the first and last of the last `interval` blocks.
///
/// `None` until the chain holds `interval` blocks, or when `interval < 2`.
pub fn window_elapsed(blocks: &[Arc<Block>], interval: u64) -> Option<u64> {
    let interval = usize::try_from(interval).ok()?;
    if interval < 2 || blocks.len() < interval {
        return None;
    }
    let last = blocks.last()?;
    let first = &blocks[blocks.len() - interval];
    Some(last.timestamp.saturating_sub(first.timestamp))
}
